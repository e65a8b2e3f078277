use ::std::io;
use ::std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::net::{Addrd, PskVerifier, Security, Socket, SocketErrorKind};

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

fn no_dtls() -> io::Error {
  io::Error::new(io::ErrorKind::Unsupported,
                 "std::net::UdpSocket cannot establish DTLS sessions")
}

/// Plain CoAP over UDP.
///
/// Secure sessions need a DTLS-capable [`Socket`]; asking a
/// `UdpSocket` for one fails with an error classified as
/// [`SocketErrorKind::Tls`].
impl Socket for UdpSocket {
  type Error = io::Error;

  fn bind_raw<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let sock = UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
    UdpSocket::local_addr(self)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), msg.addr())
        .map(|_| ())
        .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    self.recv_from(buffer)
        .map(|(n, addr)| Addrd(n, addr))
        .map_err(io_to_nb)
  }

  fn handshake(&mut self, _: SocketAddr, security: Security<'_>) -> Result<(), Self::Error> {
    match security {
      | Security::None => Ok(()),
      | _ => Err(no_dtls()),
    }
  }

  fn set_psk_verifier(&mut self, verifier: Option<PskVerifier>) -> Result<(), Self::Error> {
    match verifier {
      | None => Ok(()),
      | Some(_) => Err(no_dtls()),
    }
  }

  fn error_kind(e: &Self::Error) -> SocketErrorKind {
    match e.kind() {
      | io::ErrorKind::Interrupted => SocketErrorKind::Interrupted,
      | io::ErrorKind::Unsupported => SocketErrorKind::Tls,
      | _ => SocketErrorKind::Other,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ssl::Psk;

  #[test]
  fn udp_roundtrip() {
    let a = <UdpSocket as Socket>::bind_raw("127.0.0.1:0").unwrap();
    let b = <UdpSocket as Socket>::bind_raw("127.0.0.1:0").unwrap();
    let b_addr = Socket::local_addr(&b).unwrap();

    Socket::send(&a, Addrd(&b"ping"[..], b_addr)).unwrap();

    let mut buf = [0u8; 16];
    let Addrd(n, from) = nb::block!(Socket::recv(&b, &mut buf)).unwrap();
    assert_eq!(&buf[..n], b"ping");
    assert_eq!(from, Socket::local_addr(&a).unwrap());
  }

  #[test]
  fn no_dtls_on_plain_udp() {
    let mut a = <UdpSocket as Socket>::bind_raw("127.0.0.1:0").unwrap();
    let psk = Psk::new("dev1", [1u8]);
    let peer = Socket::local_addr(&a).unwrap();

    assert!(a.handshake(peer, Security::None).is_ok());

    let e = a.handshake(peer, Security::Psk(&psk)).unwrap_err();
    assert_eq!(<UdpSocket as Socket>::error_kind(&e), SocketErrorKind::Tls);
  }
}
