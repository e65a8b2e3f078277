use std_alloc::string::String;
use std_alloc::vec::Vec;

use super::known::{self, OptionKind};
use super::{OptNumber, OptValue};

/// The meaning of an option's value, according to the
/// [`OptionKind`] of its number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OptionValue {
  /// No value
  Empty,
  /// Opaque bytes
  Opaque(Vec<u8>),
  /// Text
  String(String),
  /// Unsigned integer; wider than any option allows so that
  /// out-of-range values can be represented (and rejected)
  Uint(u64),
}

impl OptionValue {
  /// The kind of this value
  pub fn kind(&self) -> OptionKind {
    match self {
      | OptionValue::Empty => OptionKind::Empty,
      | OptionValue::Opaque(_) => OptionKind::Opaque,
      | OptionValue::String(_) => OptionKind::String,
      | OptionValue::Uint(_) => OptionKind::Uint(8),
    }
  }

  /// The integer, if this is a [`OptionValue::Uint`]
  pub fn as_uint(&self) -> Option<u64> {
    match self {
      | OptionValue::Uint(n) => Some(*n),
      | _ => None,
    }
  }

  /// The text, if this is a [`OptionValue::String`]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      | OptionValue::String(s) => Some(s),
      | _ => None,
    }
  }
}

impl From<&str> for OptionValue {
  fn from(s: &str) -> Self {
    OptionValue::String(s.into())
  }
}

impl From<String> for OptionValue {
  fn from(s: String) -> Self {
    OptionValue::String(s)
  }
}

impl From<&[u8]> for OptionValue {
  fn from(b: &[u8]) -> Self {
    OptionValue::Opaque(b.to_vec())
  }
}

impl From<Vec<u8>> for OptionValue {
  fn from(b: Vec<u8>) -> Self {
    OptionValue::Opaque(b)
  }
}

impl From<u32> for OptionValue {
  fn from(n: u32) -> Self {
    OptionValue::Uint(n.into())
  }
}

impl From<u16> for OptionValue {
  fn from(n: u16) -> Self {
    OptionValue::Uint(n.into())
  }
}

/// Errors converting an option between its semantic and wire forms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionCodecError {
  /// The option number has no known value kind
  UnknownOptionKey(OptNumber),
  /// The integer does not fit in the widest encoding the option allows
  ValueTooLarge {
    /// option being encoded
    number: OptNumber,
    /// rejected value
    value: u64,
  },
  /// The wire value's length is not valid for the option's kind
  MalformedLength {
    /// option being decoded
    number: OptNumber,
    /// length that was found
    len: usize,
  },
  /// A value of one kind was supplied for an option of another kind
  WrongKind {
    /// option being encoded
    number: OptNumber,
    /// kind the option carries
    expected: OptionKind,
  },
  /// A string option's bytes were not UTF-8
  InvalidUtf8(OptNumber),
}

impl core::fmt::Display for OptionCodecError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnknownOptionKey(n) => write!(f, "unknown option key {}", n.0),
      | Self::ValueTooLarge { number, value } => {
        write!(f, "value {} too large for {}", value, number)
      },
      | Self::MalformedLength { number, len } => {
        write!(f, "{} byte value is malformed for {}", len, number)
      },
      | Self::WrongKind { number, expected } => {
        write!(f, "{} expects a value of kind {:?}", number, expected)
      },
      | Self::InvalidUtf8(n) => write!(f, "{} is not valid UTF-8", n),
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for OptionCodecError {}

/// The number of bytes needed to write `n` as an option value:
/// 1 below 2^8, 2 below 2^16, 4 below 2^32, and `None` from 2^32 up.
pub fn uint_len(n: u64) -> Option<usize> {
  match n {
    | n if n < 1 << 8 => Some(1),
    | n if n < 1 << 16 => Some(2),
    | n if n < 1 << 32 => Some(4),
    | _ => None,
  }
}

/// Convert an option's semantic value into wire bytes.
///
/// Integers are written big-endian in the fewest of 1, 2 or 4 bytes.
///
/// ```
/// use tadpole_msg::{encode_option, known, OptionCodecError, OptionValue};
///
/// let enc = |n| encode_option(known::MAXAGE, &OptionValue::Uint(n)).map(|v| v.0);
///
/// assert_eq!(enc(255), Ok(vec![0xFF]));
/// assert_eq!(enc(256), Ok(vec![0x01, 0x00]));
/// assert_eq!(enc(65536), Ok(vec![0x00, 0x01, 0x00, 0x00]));
/// assert!(matches!(enc(1 << 32), Err(OptionCodecError::ValueTooLarge { .. })));
/// ```
pub fn encode_option(number: OptNumber,
                     value: &OptionValue)
                     -> Result<OptValue, OptionCodecError> {
  let kind = known::kind_of(number).ok_or(OptionCodecError::UnknownOptionKey(number))?;
  let wrong_kind = OptionCodecError::WrongKind { number,
                                                 expected: kind };

  match (kind, value) {
    | (OptionKind::Empty, OptionValue::Empty) => Ok(OptValue(Vec::new())),
    | (OptionKind::Opaque, OptionValue::Opaque(bytes)) => Ok(OptValue(bytes.clone())),
    | (OptionKind::String, OptionValue::String(s)) => Ok(OptValue(s.as_bytes().to_vec())),
    | (OptionKind::Uint(max), OptionValue::Uint(n)) => {
      let too_large = OptionCodecError::ValueTooLarge { number,
                                                        value: *n };
      let len = uint_len(*n).filter(|len| *len <= max).ok_or(too_large)?;

      let bytes = n.to_be_bytes();
      Ok(OptValue(bytes[bytes.len() - len..].to_vec()))
    },
    | _ => Err(wrong_kind),
  }
}

/// Interpret an option's wire bytes according to the kind of its number.
///
/// ```
/// use tadpole_msg::{decode_option, known, OptionCodecError, OptionValue};
///
/// assert_eq!(decode_option(known::CONTENT_FORMAT, &[0, 50]),
///            Ok(OptionValue::Uint(50)));
/// assert_eq!(decode_option(known::URI_PATH, b"led"),
///            Ok(OptionValue::from("led")));
/// assert!(matches!(decode_option(known::MAXAGE, &[0, 0, 1]),
///                  Err(OptionCodecError::MalformedLength { len: 3, .. })));
/// ```
pub fn decode_option(number: OptNumber, bytes: &[u8]) -> Result<OptionValue, OptionCodecError> {
  let kind = known::kind_of(number).ok_or(OptionCodecError::UnknownOptionKey(number))?;
  let malformed = OptionCodecError::MalformedLength { number,
                                                      len: bytes.len() };

  match kind {
    | OptionKind::Empty if bytes.is_empty() => Ok(OptionValue::Empty),
    | OptionKind::Empty => Err(malformed),
    | OptionKind::Opaque => Ok(OptionValue::Opaque(bytes.to_vec())),
    | OptionKind::String => core::str::from_utf8(bytes).map(|s| OptionValue::String(s.into()))
                                                       .map_err(|_| {
                                                         OptionCodecError::InvalidUtf8(number)
                                                       }),
    | OptionKind::Uint(max) => match bytes.len() {
      | len @ (1 | 2 | 4) if len <= max => {
        let mut be = [0u8; 8];
        be[8 - len..].copy_from_slice(bytes);
        Ok(OptionValue::Uint(u64::from_be_bytes(be)))
      },
      | _ => Err(malformed),
    },
  }
}
