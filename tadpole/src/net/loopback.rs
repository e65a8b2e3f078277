//! An in-memory datagram network.
//!
//! Every [`Loopback`] socket bound on a thread joins that thread's network
//! and is reachable at `127.0.0.1:<port>`. Datagrams are delivered
//! instantly and in order.
//!
//! PSK handshakes are simulated: the initiating side presents its identity
//! to the [`PskVerifier`] installed on the peer, and the handshake succeeds
//! when the key written by the verifier equals its own. A socket with a
//! verifier installed refuses datagrams from peers that have not
//! completed a handshake with it. Certificate handshakes are not supported.
//!
//! ```
//! use tadpole::net::loopback::Loopback;
//! use tadpole::net::{Addrd, Socket};
//!
//! let a = Loopback::bind_raw("127.0.0.1:0").unwrap();
//! let b = Loopback::bind_raw("127.0.0.1:0").unwrap();
//!
//! a.send(Addrd(&b"hi"[..], b.local_addr().unwrap())).unwrap();
//!
//! let mut buf = [0u8; 8];
//! let Addrd(n, from) = b.recv(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"hi");
//! assert_eq!(from, a.local_addr().unwrap());
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use super::{Addrd, PskVerifier, Security, Socket, SocketErrorKind};

const FIRST_EPHEMERAL_PORT: u16 = 49152;
const MAX_KEY_LEN: usize = 64;

#[derive(Default)]
struct Endpoint {
  inbox: VecDeque<Addrd<Vec<u8>>>,
  verifier: Option<PskVerifier>,
  authenticated: HashSet<SocketAddr>,
}

#[derive(Default)]
struct Network {
  endpoints: HashMap<u16, Endpoint>,
  next_ephemeral: u16,
}

impl Network {
  fn ephemeral_port(&mut self) -> Option<u16> {
    let start = self.next_ephemeral.max(FIRST_EPHEMERAL_PORT);
    let port = (start..=u16::MAX).chain(FIRST_EPHEMERAL_PORT..start)
                                 .find(|p| !self.endpoints.contains_key(p))?;
    self.next_ephemeral = port.checked_add(1).unwrap_or(FIRST_EPHEMERAL_PORT);
    Some(port)
  }
}

thread_local! {
  static NETWORK: RefCell<Network> = RefCell::new(Network::default());
}

fn addr_of(port: u16) -> SocketAddr {
  SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// Errors yielded by [`Loopback`] sockets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopbackError {
  /// The address did not resolve
  Resolve(String),
  /// Another socket on this thread is bound to the port
  AddrInUse(u16),
  /// No ports left
  NoPortsAvailable,
  /// No socket is bound to the destination
  Unreachable(SocketAddr),
  /// The peer rejected our PSK, or has no verifier installed
  HandshakeFailed(SocketAddr),
  /// The peer requires a handshake we have not completed
  NotAuthenticated(SocketAddr),
  /// The requested security is not simulated
  Unsupported(&'static str),
}

/// A socket on the current thread's in-memory network
#[derive(Debug)]
pub struct Loopback {
  port: u16,
}

impl Loopback {
  /// Number of datagrams waiting to be received by this socket
  pub fn pending(&self) -> usize {
    NETWORK.with(|net| {
             net.borrow()
                .endpoints
                .get(&self.port)
                .map(|ep| ep.inbox.len())
                .unwrap_or(0)
           })
  }
}

impl Drop for Loopback {
  fn drop(&mut self) {
    // the thread-local may already be gone during thread teardown
    NETWORK.try_with(|net| net.borrow_mut().endpoints.remove(&self.port))
           .ok();
  }
}

impl Socket for Loopback {
  type Error = LoopbackError;

  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let addr = addr.to_socket_addrs()
                   .map_err(|e| LoopbackError::Resolve(e.to_string()))?
                   .next()
                   .ok_or_else(|| LoopbackError::Resolve("no addresses".into()))?;

    NETWORK.with(|net| {
             let mut net = net.borrow_mut();
             let port = match addr.port() {
               | 0 => net.ephemeral_port().ok_or(LoopbackError::NoPortsAvailable)?,
               | p if net.endpoints.contains_key(&p) => return Err(LoopbackError::AddrInUse(p)),
               | p => p,
             };

             net.endpoints.insert(port, Endpoint::default());
             Ok(Loopback { port })
           })
  }

  fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
    Ok(addr_of(self.port))
  }

  fn send(&self, Addrd(bytes, to): Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    let from = addr_of(self.port);

    NETWORK.with(|net| {
             let mut net = net.borrow_mut();
             let peer = net.endpoints
                           .get_mut(&to.port())
                           .ok_or(LoopbackError::Unreachable(to))?;

             if peer.verifier.is_some() && !peer.authenticated.contains(&from) {
               return Err(LoopbackError::NotAuthenticated(to));
             }

             peer.inbox.push_back(Addrd(bytes.to_vec(), from));
             Ok(())
           })
           .map_err(nb::Error::Other)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    let dgram = NETWORK.with(|net| {
                         net.borrow_mut()
                            .endpoints
                            .get_mut(&self.port)
                            .and_then(|ep| ep.inbox.pop_front())
                       });

    match dgram {
      | Some(Addrd(bytes, from)) => {
        let n = bytes.len().min(buffer.len());
        buffer[..n].copy_from_slice(&bytes[..n]);
        Ok(Addrd(n, from))
      },
      | None => Err(nb::Error::WouldBlock),
    }
  }

  fn handshake(&mut self, peer: SocketAddr, security: Security<'_>) -> Result<(), Self::Error> {
    let psk = match security {
      | Security::None => return Ok(()),
      | Security::X509(_) => return Err(LoopbackError::Unsupported("x509")),
      | Security::Psk(psk) => psk,
    };

    let verifier = NETWORK.with(|net| {
                            net.borrow()
                               .endpoints
                               .get(&peer.port())
                               .map(|ep| ep.verifier.clone())
                               .ok_or(LoopbackError::Unreachable(peer))
                          })?
                          .ok_or(LoopbackError::HandshakeFailed(peer))?;

    // the verifier is user code; no borrow of the network is held while it runs
    let mut key = [0u8; MAX_KEY_LEN];
    let n = verifier(&psk.identity, &mut key).min(MAX_KEY_LEN);

    if n == 0 || key[..n] != psk.psk[..] {
      log::warn!(target: "tadpole", "loopback: {} rejected PSK identity {:?}", peer, String::from_utf8_lossy(&psk.identity));
      return Err(LoopbackError::HandshakeFailed(peer));
    }

    let me = addr_of(self.port);
    NETWORK.with(|net| {
             if let Some(ep) = net.borrow_mut().endpoints.get_mut(&peer.port()) {
               ep.authenticated.insert(me);
             }
           });

    Ok(())
  }

  fn set_psk_verifier(&mut self, verifier: Option<PskVerifier>) -> Result<(), Self::Error> {
    NETWORK.with(|net| {
             if let Some(ep) = net.borrow_mut().endpoints.get_mut(&self.port) {
               if verifier.is_none() {
                 ep.authenticated.clear();
               }
               ep.verifier = verifier;
             }
           });

    Ok(())
  }

  fn error_kind(e: &Self::Error) -> SocketErrorKind {
    match e {
      | LoopbackError::HandshakeFailed(_)
      | LoopbackError::NotAuthenticated(_)
      | LoopbackError::Unsupported(_) => SocketErrorKind::Tls,
      | _ => SocketErrorKind::Other,
    }
  }
}

#[cfg(test)]
mod test {
  use std::rc::Rc;

  use super::*;
  use crate::ssl::Psk;

  fn dev1_verifier() -> PskVerifier {
    Rc::new(|identity: &[u8], key: &mut [u8]| {
      if identity == b"dev1" {
        key[..3].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        3
      } else {
        0
      }
    })
  }

  #[test]
  fn ports_are_exclusive_and_released() {
    let a = Loopback::bind_raw("127.0.0.1:7000").unwrap();
    assert_eq!(Loopback::bind_raw("127.0.0.1:7000").unwrap_err(),
               LoopbackError::AddrInUse(7000));

    drop(a);
    assert!(Loopback::bind_raw("127.0.0.1:7000").is_ok());
  }

  #[test]
  fn ephemeral_ports_differ() {
    let a = Loopback::bind_raw("0.0.0.0:0").unwrap();
    let b = Loopback::bind_raw("0.0.0.0:0").unwrap();

    assert_ne!(a.local_addr().unwrap(), b.local_addr().unwrap());
    assert!(a.local_addr().unwrap().port() >= FIRST_EPHEMERAL_PORT);
  }

  #[test]
  fn unreachable() {
    let a = Loopback::bind_raw("127.0.0.1:0").unwrap();
    let nobody = addr_of(9);

    assert_eq!(a.send(Addrd(&b"x"[..], nobody)),
               Err(nb::Error::Other(LoopbackError::Unreachable(nobody))));
  }

  #[test]
  fn truncates_long_datagrams() {
    let a = Loopback::bind_raw("127.0.0.1:0").unwrap();
    a.send(Addrd(&b"hello"[..], a.local_addr().unwrap())).unwrap();

    let mut buf = [0u8; 2];
    assert_eq!(a.recv(&mut buf).unwrap().data(), &2);
    assert_eq!(&buf, b"he");
    assert_eq!(a.recv(&mut buf), Err(nb::Error::WouldBlock));
  }

  #[test]
  fn psk_handshake() {
    let mut server = Loopback::bind_raw("127.0.0.1:0").unwrap();
    server.set_psk_verifier(Some(dev1_verifier())).unwrap();
    let server_addr = server.local_addr().unwrap();

    let mut good = Loopback::bind_raw("127.0.0.1:0").unwrap();
    let mut bad = Loopback::bind_raw("127.0.0.1:0").unwrap();

    assert_eq!(bad.send(Addrd(&b"x"[..], server_addr)),
               Err(nb::Error::Other(LoopbackError::NotAuthenticated(server_addr))));

    let wrong_key = Psk::new("dev1", [0xAAu8, 0xBB, 0xCD]);
    assert_eq!(bad.handshake(server_addr, Security::Psk(&wrong_key)),
               Err(LoopbackError::HandshakeFailed(server_addr)));

    let right = Psk::new("dev1", [0xAAu8, 0xBB, 0xCC]);
    good.handshake(server_addr, Security::Psk(&right)).unwrap();
    good.send(Addrd(&b"x"[..], server_addr)).unwrap();
    assert_eq!(server.pending(), 1);

    assert_eq!(Loopback::error_kind(&LoopbackError::HandshakeFailed(server_addr)),
               SocketErrorKind::Tls);
  }

  #[test]
  fn handshake_needs_a_verifier() {
    let server = Loopback::bind_raw("127.0.0.1:0").unwrap();
    let mut client = Loopback::bind_raw("127.0.0.1:0").unwrap();
    let psk = Psk::new("dev1", [1u8]);

    assert_eq!(client.handshake(server.local_addr().unwrap(), Security::Psk(&psk)),
               Err(LoopbackError::HandshakeFailed(server.local_addr().unwrap())));
    assert_eq!(client.handshake(server.local_addr().unwrap(), Security::None),
               Ok(()));
  }
}
