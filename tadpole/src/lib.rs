//! `tadpole` is the session layer of a CoAP stack: resources, observe,
//! and the client & server lifecycles that sit on top of [`tadpole_msg`].
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the semantics of HTTP
//! to an environment conducive to **constrained** devices. (weak hardware, small battery capacity, etc.)
//!
//! ### Similarities to HTTP
//! CoAP has the same verbs and many of the same semantics as HTTP;
//! - GET, POST, PUT, DELETE
//! - Headers (renamed to [Options](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10))
//! - Data format independent (via the [Content-Format](https://datatracker.ietf.org/doc/html/rfc7252#section-12.3) Option)
//! - [Response status codes](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9)
//!
//! ### Differences from HTTP
//! - CoAP customarily sits on top of UDP, secured with DTLS (X.509 certificates or pre-shared keys)
//! - Clients may **observe** a resource; the server then pushes a notification every time it changes
//!
//! ## Layout
//! - [`server::Resource`]s are registered on a [`server::Server`], which
//!   dispatches incoming requests to their handlers and keeps track of observers
//! - a [`client::Client`] sends requests, retransmits confirmable ones and
//!   delivers outcomes to completion callbacks
//! - both are driven by calling `poll` from a single thread; every callback runs inside `poll`
//! - the transport is anything implementing [`net::Socket`]
//!
//! ```
//! use tadpole::net::loopback::Loopback;
//! use tadpole::resp::{code, Resp};
//! use tadpole::server::{Resource, Server};
//! use tadpole::session::SessionConfig;
//!
//! let mut server = Server::<Loopback>::new(SessionConfig { port: Some(5683),
//!                                                          ..Default::default() });
//! server.create_server().unwrap();
//! server.init_resources(vec![Resource::new("status").get(|_req| {
//!                                                       Resp::new(code::CONTENT).payload("ok")
//!                                                     })])
//!       .unwrap();
//! server.start_server(None).unwrap();
//! ```

#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
#![allow(clippy::type_complexity)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]


pub(crate) mod logging;

/// customizable retrying of fallible operations
pub mod retry;

/// time abstractions
pub mod time;

/// configuring runtime behavior
pub mod config;

/// errors and delivery outcomes
pub mod error;

/// network abstractions
pub mod net;

/// shared (D)TLS configuration
pub mod ssl;

/// session configuration & lifecycle states
pub mod session;

/// requests
pub mod req;

/// responses
pub mod resp;

/// resources, dispatch & observe
pub mod server;

/// CoAP client
pub mod client;

/// `std`-only tadpole stuff
#[cfg(feature = "std")]
#[cfg_attr(any(docsrs, feature = "docs"), doc(cfg(feature = "std")))]
pub mod std;

pub use tadpole_msg as msg;

macro_rules! code {
  (rfc7252($section:literal) $name:ident = $c:literal * $d:literal) => {
    #[doc = concat!("[RFC7252 Section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7252#section-", $section, ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: tadpole_msg::Code = tadpole_msg::Code::new($c, $d);
  };
  (rfc7252($section:literal) $name:ident = $newtype:tt($c:literal * $d:literal)) => {
    #[doc = concat!("[RFC7252 Section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7252#section-", $section, ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: $newtype = $newtype(tadpole_msg::Code::new($c, $d));
  };
}

pub(crate) use code;
