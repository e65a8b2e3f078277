use std::net::{SocketAddr, ToSocketAddrs};

use serde::Deserialize;

use crate::error::{Error, What, When};
use crate::net::Security;
use crate::ssl::{Psk, SslConfig};

/// Default port for plain CoAP
pub const COAP_PORT: u16 = 5683;

/// Default port for CoAP over DTLS
pub const COAPS_PORT: u16 = 5684;

/// Where a client or server lives on the network and how it is secured.
///
/// Created once and read-only afterwards.
///
/// ```
/// use tadpole::net::Security;
/// use tadpole::session::SessionConfig;
///
/// let cfg = SessionConfig::from_json(r#"{
///   "uri": "coaps://127.0.0.1/",
///   "psk": { "identity": "dev1", "psk": [170, 187, 204] }
/// }"#).unwrap();
///
/// assert_eq!(cfg.port(), 5684);
/// assert!(matches!(cfg.security(), Security::Psk(_)));
/// assert_eq!(cfg.peer_addr().unwrap(), "127.0.0.1:5684".parse().unwrap());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// `coap://host[:port][/...]` (or `coaps://`) of the server a client talks to.
  ///
  /// Ignored by servers.
  pub uri: String,
  /// Port to use when `uri` does not name one, and the port a server listens on.
  ///
  /// Defaults to 5683, or 5684 when the session is secured.
  pub port: Option<u16>,
  /// X.509 settings
  pub ssl: Option<SslConfig>,
  /// Pre-shared key settings; preferred over `ssl` when both are given
  pub psk: Option<Psk>,
  /// (servers) identities presented in PSK handshakes are checked
  /// by a callback given to `start_server`
  pub verify_psk: bool,
}

impl SessionConfig {
  /// Parse a config from JSON and [`check`](SessionConfig::check) it
  pub fn from_json(json: &str) -> Result<Self, Error> {
    let cfg: Self =
      serde_json::from_str(json).map_err(|e| When::Configure.what(What::BadArgs(e.to_string())))?;
    cfg.check()?;
    Ok(cfg)
  }

  /// Check the security settings for consistency
  pub fn check(&self) -> Result<(), Error> {
    let bad_args = |why: String| When::Configure.what(What::BadArgs(why));

    if let Some(psk) = &self.psk {
      psk.check().map_err(bad_args)?;
    }

    if let Some(ssl) = &self.ssl {
      ssl.check().map_err(bad_args)?;
    }

    Ok(())
  }

  /// The security to use in handshakes.
  ///
  /// PSK wins when both PSK and X.509 are configured.
  pub fn security(&self) -> Security<'_> {
    match (&self.psk, &self.ssl) {
      | (Some(psk), _) => Security::Psk(psk),
      | (None, Some(ssl)) => Security::X509(ssl),
      | (None, None) => Security::None,
    }
  }

  /// Is any security configured?
  pub fn is_secure(&self) -> bool {
    !matches!(self.security(), Security::None)
  }

  /// The configured port, or the default for the session's security
  pub fn port(&self) -> u16 {
    self.port.unwrap_or(if self.is_secure() || self.uri.starts_with("coaps://") {
                          COAPS_PORT
                        } else {
                          COAP_PORT
                        })
  }

  /// Resolve the address of the server named by `uri`
  pub fn peer_addr(&self) -> Result<SocketAddr, Error> {
    let bad_args = |why: String| When::CreateClient.what(What::BadArgs(why));

    let (host, port) = authority(&self.uri).map_err(bad_args)?;
    let port = port.unwrap_or_else(|| self.port());

    (host, port).to_socket_addrs()
                .map_err(|e| bad_args(format!("could not resolve {}: {}", host, e)))?
                .next()
                .ok_or_else(|| bad_args(format!("{} resolved to no addresses", host)))
  }
}

/// Split the host and optional port out of a `coap(s)://` uri
fn authority(uri: &str) -> Result<(&str, Option<u16>), String> {
  let rest = uri.strip_prefix("coap://")
                .or_else(|| uri.strip_prefix("coaps://"))
                .ok_or_else(|| format!("uri {:?} is not coap:// or coaps://", uri))?;
  let authority = rest.split(|c| c == '/' || c == '?').next().unwrap_or_default();

  let parse_port = |p: &str| {
    p.parse::<u16>()
     .map_err(|_| format!("invalid port {:?} in uri {:?}", p, uri))
  };

  let (host, port) = match authority.strip_prefix('[') {
    | Some(v6) => {
      let (host, after) = v6.split_once(']')
                            .ok_or_else(|| format!("unclosed [ in uri {:?}", uri))?;
      match after.strip_prefix(':') {
        | Some(p) => (host, Some(parse_port(p)?)),
        | None if after.is_empty() => (host, None),
        | None => return Err(format!("unexpected {:?} after host in uri {:?}", after, uri)),
      }
    },
    | None => match authority.split_once(':') {
      | Some((host, p)) => (host, Some(parse_port(p)?)),
      | None => (authority, None),
    },
  };

  if host.is_empty() {
    Err(format!("uri {:?} has no host", uri))
  } else {
    Ok((host, port))
  }
}

/// Lifecycle of a client or server
///
/// ```text
/// Created -> Configured -> Connected (client) -> Closed
///                       \-> Listening (server) -/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
  /// Constructed from a [`SessionConfig`], no transport yet
  Created,
  /// Transport allocated
  Configured,
  /// Client handshake done; messages may be sent
  Connected,
  /// Server accepting requests
  Listening,
  /// Resources released
  Closed,
}

impl State {
  /// Lowercase name of the state
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Created => "created",
      | Self::Configured => "configured",
      | Self::Connected => "connected",
      | Self::Listening => "listening",
      | Self::Closed => "closed",
    }
  }
}

impl core::fmt::Display for State {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn authority_forms() {
    assert_eq!(authority("coap://127.0.0.1"), Ok(("127.0.0.1", None)));
    assert_eq!(authority("coap://127.0.0.1:6000/led"), Ok(("127.0.0.1", Some(6000))));
    assert_eq!(authority("coaps://[::1]:5684/"), Ok(("::1", Some(5684))));
    assert_eq!(authority("coap://[::1]?q"), Ok(("::1", None)));
    assert_eq!(authority("coap://localhost/a/b"), Ok(("localhost", None)));

    assert!(authority("http://127.0.0.1").is_err());
    assert!(authority("coap://:5683").is_err());
    assert!(authority("coap://host:port").is_err());
    assert!(authority("coap://[::1").is_err());
  }

  #[test]
  fn default_ports() {
    let plain = SessionConfig { uri: "coap://127.0.0.1".into(),
                                ..Default::default() };
    assert_eq!(plain.port(), COAP_PORT);

    let psk = SessionConfig { psk: Some(Psk::new("dev1", [1u8])),
                              ..plain.clone() };
    assert_eq!(psk.port(), COAPS_PORT);

    let explicit = SessionConfig { port: Some(7000),
                                   ..psk };
    assert_eq!(explicit.port(), 7000);
    assert_eq!(explicit.peer_addr().unwrap(), "127.0.0.1:7000".parse().unwrap());
  }

  #[test]
  fn psk_wins_over_x509() {
    let cfg = SessionConfig { ssl: Some(SslConfig::default()),
                              psk: Some(Psk::new("dev1", [1u8])),
                              ..Default::default() };

    assert!(matches!(cfg.security(), Security::Psk(_)));

    let x509 = SessionConfig { psk: None,
                               ..cfg };
    assert!(matches!(x509.security(), Security::X509(_)));
  }

  #[test]
  fn from_json_rejects_bad_values() {
    let e = SessionConfig::from_json(r#"{"port": "five"}"#).unwrap_err();
    assert_eq!(e.code(), -1);

    let e = SessionConfig::from_json(r#"{"psk": {"identity": "", "psk": [1]}}"#).unwrap_err();
    assert_eq!(e.what, What::BadArgs("psk identity is empty".into()));

    let e = SessionConfig::from_json(r#"{"ssl": {"verify_cert": "always"}}"#).unwrap_err();
    assert_eq!(e.when, When::Configure);
  }
}
