use std::net::SocketAddr;

use tadpole_msg::{Message, Token, Type};

/// Request methods
pub mod method;

#[doc(inline)]
pub use method::Method;

use crate::net::Addrd;

/// An incoming CoAP request, as seen by a resource handler
///
/// ```
/// use tadpole::msg::{Code, Id, Message, Token, Type};
/// use tadpole::req::{Method, Req};
///
/// let mut msg = Message::new(Type::Con, Code::new(0, 3), Id(1), Token::default());
/// msg.set_path("led");
/// msg.payload.0 = b"on".to_vec();
///
/// let req = Req::new(msg, "127.0.0.1:5683".parse().unwrap());
///
/// assert_eq!(req.method(), Some(Method::PUT));
/// assert_eq!(req.path(), Some("led".to_string()));
/// assert_eq!(req.payload_str(), Ok("on"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Req {
  msg: Message,
  addr: SocketAddr,
}

impl Req {
  /// Wrap a message received from `addr`
  pub fn new(msg: Message, addr: SocketAddr) -> Self {
    Self { msg, addr }
  }

  /// Obtain a reference to the inner message
  pub fn msg(&self) -> &Message {
    &self.msg
  }

  /// Who sent this request
  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  /// Get the request method, if the code is one of the four methods
  pub fn method(&self) -> Option<Method> {
    Method::from_code(self.msg.code)
  }

  /// Get the request type (confirmable, non-confirmable)
  pub fn msg_type(&self) -> Type {
    self.msg.ty
  }

  /// Get the request token
  pub fn token(&self) -> Token {
    self.msg.token
  }

  /// Get the request path (Uri-Path options joined with `/`);
  /// `None` if a segment is not UTF-8
  pub fn path(&self) -> Option<String> {
    self.msg.path().ok()
  }

  /// Get the payload's raw bytes
  pub fn payload(&self) -> &[u8] {
    &self.msg.payload.0
  }

  /// Get the payload and attempt to interpret it as an utf8 string
  pub fn payload_str(&self) -> Result<&str, core::str::Utf8Error> {
    core::str::from_utf8(self.payload())
  }

  /// The Observe option: `Some(0)` registers, `Some(1)` deregisters
  pub fn observe(&self) -> Option<u32> {
    self.msg.observe()
  }
}

impl From<Addrd<Message>> for Req {
  fn from(Addrd(msg, addr): Addrd<Message>) -> Self {
    Self::new(msg, addr)
  }
}

impl From<Req> for Message {
  fn from(req: Req) -> Self {
    req.msg
  }
}
