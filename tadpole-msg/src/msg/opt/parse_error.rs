/// Errors encounterable while parsing an option from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Option Delta was set to 15, which is invalid.
  OptionDeltaReservedValue(u8),

  /// Value Length was set to 15, which is invalid.
  ValueLengthReservedValue(u8),

  /// Option number would overflow a 16-bit unsigned integer
  OptionNumberOverflow,

  /// Not a true failure case; only means we tried to read the payload marker byte (0xFF)
  /// as an option header.
  OptionsExhausted,
}

impl OptParseError {
  /// Shorthand for [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }
}

impl core::fmt::Display for OptParseError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "datagram ended inside an option"),
      | Self::OptionDeltaReservedValue(n) => write!(f, "reserved option delta nibble {}", n),
      | Self::ValueLengthReservedValue(n) => write!(f, "reserved option length nibble {}", n),
      | Self::OptionNumberOverflow => write!(f, "option number exceeds 65535"),
      | Self::OptionsExhausted => write!(f, "no more options"),
    }
  }
}
