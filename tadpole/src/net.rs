use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;

use crate::ssl::{Psk, SslConfig};

/// In-memory datagram network
pub mod loopback;

/// Data that came from a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// Decides whether a PSK identity may connect.
///
/// Called with the identity a peer presented and a buffer to write the
/// expected key into; returns the length of the key written, or `0` to
/// reject the peer.
pub type PskVerifier = Rc<dyn Fn(&[u8], &mut [u8]) -> usize>;

/// The security a handshake should establish
#[derive(Debug, Clone, Copy)]
pub enum Security<'a> {
  /// Plain CoAP
  None,
  /// DTLS authenticated with certificates
  X509(&'a SslConfig),
  /// DTLS authenticated with a pre-shared key
  Psk(&'a Psk),
}

/// Broad classes of socket failure, used to pick the
/// error reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketErrorKind {
  /// The operation was interrupted and may be tried again
  Interrupted,
  /// The secure channel could not be established or was refused
  Tls,
  /// Anything else
  Other,
}

/// A CoAP network socket
///
/// This mirrors the Udp socket traits in embedded-nal, but allows us to implement them
/// for foreign types (like `std::net::UdpSocket`), and adds the two hooks a DTLS-capable
/// transport needs: a client-side [`handshake`](Socket::handshake) and a server-side
/// [`PskVerifier`].
pub trait Socket: Sized {
  /// The error yielded by socket operations
  type Error: core::fmt::Debug;

  /// Bind the socket to an address, without doing any spooky magic things like
  /// auto-detecting and joining multicast groups.
  ///
  /// Implementors of `bind_raw` should:
  ///  - yield a socket in a non-blocking state
  ///  - bind to the first address if `addr` yields multiple addresses
  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error>;

  /// Get the local address this socket is bound to
  fn local_addr(&self) -> Result<SocketAddr, Self::Error>;

  /// Send a message to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull a buffered datagram from the socket, along with the address to the sender.
  ///
  /// It is expected that (like [`std::net::UdpSocket`]) if the message is larger
  /// than the buffer, those bytes are dropped and not considered an error condition.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Establish `security` with `peer` before any message is exchanged.
  ///
  /// With [`Security::None`] this should do nothing.
  fn handshake(&mut self, peer: SocketAddr, security: Security<'_>) -> Result<(), Self::Error>;

  /// Install (or with `None`, remove) the check run against every
  /// incoming PSK handshake.
  ///
  /// While a verifier is installed, datagrams from peers that have not
  /// completed a handshake are not delivered.
  fn set_psk_verifier(&mut self, verifier: Option<PskVerifier>) -> Result<(), Self::Error>;

  /// Classify an error yielded by this socket
  fn error_kind(_: &Self::Error) -> SocketErrorKind {
    SocketErrorKind::Other
  }

  /// Poll the socket for a datagram, reading into a buffer of `size` bytes
  fn poll(&self, size: usize) -> Result<Option<Addrd<Vec<u8>>>, Self::Error> {
    let mut buf = vec![0u8; size];
    let recvd = self.recv(&mut buf);

    match recvd {
      | Ok(Addrd(n, addr)) => {
        buf.truncate(n);
        Ok(Some(Addrd(buf, addr)))
      },
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }
}
