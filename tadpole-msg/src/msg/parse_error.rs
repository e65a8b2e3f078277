use super::opt::parse_error::OptParseError;

/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Token length was > 8
  InvalidTokenLength(u8),

  /// Version was not 1
  InvalidVersion(u8),

  /// Code class was reserved (1, 6 or 7)
  InvalidCode(u8),

  /// Error parsing option
  OptParseError(OptParseError),

  /// A payload marker was present but no payload followed it
  EmptyPayload,
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl From<OptParseError> for MessageParseError {
  fn from(e: OptParseError) -> Self {
    match e {
      | OptParseError::UnexpectedEndOfStream => Self::UnexpectedEndOfStream,
      | e => Self::OptParseError(e),
    }
  }
}

impl core::fmt::Display for MessageParseError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "datagram ended before the message did"),
      | Self::InvalidTokenLength(n) => write!(f, "token length {} is greater than 8", n),
      | Self::InvalidVersion(v) => write!(f, "unsupported version {}", v),
      | Self::InvalidCode(c) => write!(f, "reserved code class in {:#04x}", c),
      | Self::OptParseError(e) => write!(f, "{}", e),
      | Self::EmptyPayload => write!(f, "payload marker followed by an empty payload"),
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for MessageParseError {}
