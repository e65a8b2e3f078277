use tadpole_msg::codec::MessageError;
use tadpole_msg::to_bytes::MessageToBytesError;
use tadpole_msg::Message;

use crate::net::{Socket, SocketErrorKind};
use crate::session::State;

/// The operation that was being performed when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum When {
  Configure,
  CreateClient,
  Connect,
  SendMessage,
  Observe,
  CancelObserve,
  Disconnect,
  DestroyClient,
  CreateServer,
  InitResources,
  RemoveResource,
  StartServer,
  StopServer,
  NotifyResourceChanged,
  DestroyServer,
  Polling,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what(self, what: What) -> Error {
    Error { when: self, what }
  }

  /// Name of the operation, as used in error messages
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Configure => "configure",
      | Self::CreateClient => "create client",
      | Self::Connect => "connect",
      | Self::SendMessage => "send message",
      | Self::Observe => "observe",
      | Self::CancelObserve => "cancel observe",
      | Self::Disconnect => "disconnect",
      | Self::DestroyClient => "destroy client",
      | Self::CreateServer => "create server",
      | Self::InitResources => "init resources",
      | Self::RemoveResource => "remove resource",
      | Self::StartServer => "start server",
      | Self::StopServer => "stop server",
      | Self::NotifyResourceChanged => "notify resource changed",
      | Self::DestroyServer => "destroy server",
      | Self::Polling => "poll",
    }
  }
}

/// An error raised by a client or server operation
///
/// ```
/// use tadpole::error::{What, When};
/// use tadpole::session::State;
///
/// let e = When::Connect.what(What::BadState(State::Created));
/// assert_eq!(e.to_string(), "Failed to connect: not allowed while created");
/// assert_eq!(e.code(), -2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
  /// What happened?
  pub what: What,
  /// What were we doing when it happened?
  pub when: When,
}

impl Error {
  /// Stable numeric code of this error; `0` is never used
  /// and stands for success at the boundary (see [`collapse`]).
  pub fn code(&self) -> i32 {
    self.what.code()
  }

  pub(crate) fn from_socket<S: Socket>(when: When, e: S::Error) -> Self {
    let what = match S::error_kind(&e) {
      | SocketErrorKind::Interrupted => What::Interrupted,
      | SocketErrorKind::Tls => What::Tls(format!("{:?}", e)),
      | SocketErrorKind::Other => What::SockError(format!("{:?}", e)),
    };

    when.what(what)
  }
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Failed to {}: {}", self.when.as_str(), self.what)
  }
}

impl std::error::Error for Error {}

/// A contextless error with some additional debug data attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum What {
  /// Caller-supplied parameters were missing or malformed
  BadArgs(String),
  /// The session is not in a state that allows the operation
  BadState(State),
  /// The transport was interrupted before the operation completed
  Interrupted,
  /// The (D)TLS handshake failed
  Tls(String),
  /// Some other socket operation failed
  SockError(String),
  /// A message could not be built or parsed
  FromBytes(MessageError),
  /// Serializing a message to bytes failed
  ToBytes(MessageToBytesError),
  /// No resource, observation or exchange matched
  NotFound(String),
  /// The clock failed to provide timing.
  ///
  /// See [`embedded_time::clock::Error`]
  ClockError,
}

impl What {
  /// See [`Error::code`]
  pub fn code(&self) -> i32 {
    match self {
      | Self::BadArgs(_) => -1,
      | Self::BadState(_) => -2,
      | Self::Interrupted => -3,
      | Self::Tls(_) => -4,
      | Self::SockError(_) => -5,
      | Self::FromBytes(_) => -6,
      | Self::ToBytes(_) => -7,
      | Self::NotFound(_) => -8,
      | Self::ClockError => -9,
    }
  }
}

impl core::fmt::Display for What {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::BadArgs(why) => write!(f, "wrong arguments: {}", why),
      | Self::BadState(state) => write!(f, "not allowed while {}", state),
      | Self::Interrupted => write!(f, "interrupted"),
      | Self::Tls(why) => write!(f, "TLS handshake failed: {}", why),
      | Self::SockError(why) => write!(f, "socket error: {}", why),
      | Self::FromBytes(e) => write!(f, "{}", e),
      | Self::ToBytes(e) => write!(f, "{}", e),
      | Self::NotFound(what) => write!(f, "{} not found", what),
      | Self::ClockError => write!(f, "clock error"),
    }
  }
}

impl From<MessageError> for What {
  fn from(e: MessageError) -> Self {
    Self::FromBytes(e)
  }
}

impl From<MessageToBytesError> for What {
  fn from(e: MessageToBytesError) -> Self {
    Self::ToBytes(e)
  }
}

/// Why a message was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryError {
  /// A CON message was never acknowledged, or a response never came
  TooManyRetries,
  /// The transport refused to send the message
  NotDeliverable,
  /// The peer answered with a reset
  Rst,
  /// The secure channel the message needed is not established
  TlsFailed,
}

impl DeliveryError {
  /// Boundary spelling of this outcome
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::TooManyRetries => "TOO MANY RETRIES",
      | Self::NotDeliverable => "NOT DELIVERABLE",
      | Self::Rst => "RST",
      | Self::TlsFailed => "TLS FAILED",
    }
  }
}

impl core::fmt::Display for DeliveryError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::error::Error for DeliveryError {}

/// Outcome of sending a message: the response, or why there is none
pub type Delivery = Result<Message, DeliveryError>;

/// Boundary spelling of a delivery outcome; `"NONE"` on success
///
/// ```
/// use tadpole::error::{delivery_status, DeliveryError};
///
/// assert_eq!(delivery_status(&Err(DeliveryError::Rst)), "RST");
/// ```
pub fn delivery_status(delivery: &Delivery) -> &'static str {
  match delivery {
    | Ok(_) => "NONE",
    | Err(e) => e.as_str(),
  }
}

/// Collapse a result to the `(code, bytes)` pair used at an outer
/// boundary that has a single channel for payloads and error text.
///
/// ```
/// use tadpole::error::{collapse, What, When};
///
/// assert_eq!(collapse(Ok(b"23.5".to_vec())), (0, b"23.5".to_vec()));
///
/// let (code, text) = collapse(Err(When::Observe.what(What::NotFound("resource".into()))));
/// assert_eq!(code, -8);
/// assert_eq!(text, b"Failed to observe: resource not found");
/// ```
pub fn collapse(result: Result<Vec<u8>, Error>) -> (i32, Vec<u8>) {
  match result {
    | Ok(bytes) => (0, bytes),
    | Err(e) => (e.code(), e.to_string().into_bytes()),
  }
}
