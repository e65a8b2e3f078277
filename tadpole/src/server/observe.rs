use std::net::SocketAddr;

use tadpole_msg::{Message, Token};

/// A client that registered interest in a resource.
///
/// Identified by the resource path, the token of the registering
/// request and the client's address; re-registering with the same
/// three replaces the observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
  /// Path of the observed resource
  pub path: String,
  /// Token of the registering request, repeated in every notification
  pub token: Token,
  /// Where notifications go
  pub addr: SocketAddr,
  /// The registering GET, replayed against the handler for each notification
  pub request: Message,
}

impl Observer {
  /// Does this observer have this identity?
  pub fn is(&self, path: &str, token: Token, addr: SocketAddr) -> bool {
    self.path == path && self.token == token && self.addr == addr
  }
}
