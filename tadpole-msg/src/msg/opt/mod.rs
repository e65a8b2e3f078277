use std_alloc::vec::Vec;
use tadpole_common::Cursor;

use crate::from_bytes::TryConsumeBytes;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Option numbers registered by RFC7252 / RFC7641 / RFC7959
/// and the kind of value each one carries
pub mod known;

/// Converting option values between their semantic
/// and wire representations
pub mod value;
pub use value::*;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u16, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u16) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => u16::from_be_bytes([a, b]).checked_add(269)
                                                   .ok_or(OptParseError::OptionNumberOverflow),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u16),
  }
}

/// Option number, identifying which option an [`Opt`] is
/// (e.g. Content-Format is 12).
///
/// On the wire only the difference to the previous option's number
/// is written, which is why options must be emitted in ascending order.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u16);

impl OptNumber {
  /// Critical options must be understood by the recipient;
  /// an unrecognized critical option in a request is answered with 4.02.
  ///
  /// ```
  /// use tadpole_msg::known;
  ///
  /// assert!(known::URI_PATH.is_critical());
  /// assert!(!known::CONTENT_FORMAT.is_critical());
  /// ```
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }

  /// Unsafe-to-forward options must be understood by a proxy
  /// before it may forward the message.
  pub fn is_unsafe_to_forward(&self) -> bool {
    self.0 & 0b10 == 0b10
  }

  /// Safe-to-forward options that are not part of a proxy's cache key
  pub fn is_no_cache_key(&self) -> bool {
    self.0 & 0b11110 == 0b11100
  }
}

impl core::fmt::Display for OptNumber {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match known::name_of(*self) {
      | Some(name) => write!(f, "{}", name),
      | None => write!(f, "option {}", self.0),
    }
  }
}

/// Raw bytes of an option's value, exactly as they appear on the wire
#[derive(Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Borrow the value's bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

/// A single option instance in a [`crate::Message`]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Opt {
  /// See [`OptNumber`]
  pub number: OptNumber,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Size of this option on the wire when following an option numbered `prev`
  pub(crate) fn wire_size(&self, prev: OptNumber) -> usize {
    let ext = |n: u16| match n {
      | n if n >= 269 => 2,
      | n if n >= 13 => 1,
      | _ => 0,
    };

    1 + ext(self.number.0 - prev.0) + ext(self.value.0.len() as u16) + self.value.0.len()
  }

  /// Append this option's bytes to `bytes`.
  ///
  /// `prev` is the number of the option written before this one
  /// (or `OptNumber(0)` for the first); it must not exceed this option's number.
  pub(crate) fn extend_bytes(&self, prev: OptNumber, bytes: &mut impl Extend<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.number.0 - prev.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.0.len() as u16);

    bytes.extend(Some(del << 4 | len));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
  }
}

/// The delta & value of an option, before its number is known
#[derive(Clone, PartialEq, Debug)]
pub(crate) struct RawOpt {
  pub(crate) delta: u16,
  pub(crate) value: Vec<u8>,
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for RawOpt {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let byte1 = match bytes.peek_exact(1).map(|b| b[0]) {
      | None | Some(0b11111111) => return Err(OptParseError::OptionsExhausted),
      | Some(b) => {
        bytes.next();
        b
      },
    };

    // delta extension bytes come before length extension bytes
    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;

    let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))?
              as usize;

    let value = bytes.take_exact(len).ok_or_else(OptParseError::eof)?.to_vec();

    Ok(RawOpt { delta, value })
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Vec<Opt> {
  type Error = OptParseError;

  /// Consume options up to the payload marker (which is left in the cursor)
  /// or the end of the datagram.
  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Vec::new();
    let mut number = 0u16;

    loop {
      match RawOpt::try_consume_bytes(bytes) {
        | Ok(RawOpt { delta, value }) => {
          number = number.checked_add(delta)
                         .ok_or(OptParseError::OptionNumberOverflow)?;
          opts.push(Opt { number: OptNumber(number),
                          value: OptValue(value) });
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_opt() {
    let mut opt_bytes = Cursor::new([0b00010001, 0b00000001]);
    let opt = RawOpt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               RawOpt { delta: 1,
                        value: vec![1] });

    let mut opt_bytes = Cursor::new([0b11010001, 0b00000001, 0b00000001]);
    let opt = RawOpt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               RawOpt { delta: 14,
                        value: vec![1] });

    let mut opt_bytes = Cursor::new([0b11100001, 0b00000000, 0b00000001, 0b00000001]);
    let opt = RawOpt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               RawOpt { delta: 270,
                        value: vec![1] });
  }

  #[test]
  fn parse_opts_accumulates_numbers() {
    let mut opt_bytes = Cursor::new([0b00000001, 0b00000001, 0b00010001, 0b00000011, 0b11111111]);
    let opts = Vec::<Opt>::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opts,
               vec![Opt { number: OptNumber(0),
                          value: OptValue(vec![1]) },
                    Opt { number: OptNumber(1),
                          value: OptValue(vec![3]) },]);
    assert_eq!(opt_bytes.until_end(), &[0b11111111]);
  }

  #[test]
  fn parse_opt_reserved_nibbles() {
    let mut opt_bytes = Cursor::new([0b11110001, 0]);
    assert_eq!(RawOpt::try_consume_bytes(&mut opt_bytes),
               Err(OptParseError::OptionDeltaReservedValue(15)));

    let mut opt_bytes = Cursor::new([0b00011111, 0]);
    assert_eq!(RawOpt::try_consume_bytes(&mut opt_bytes),
               Err(OptParseError::ValueLengthReservedValue(15)));
  }

  #[test]
  fn parse_opt_value_truncated() {
    let mut opt_bytes = Cursor::new([0b00010011, 1, 2]);
    assert_eq!(RawOpt::try_consume_bytes(&mut opt_bytes),
               Err(OptParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn opt_number_qualities() {
    // critical, unsafe-to-forward
    assert!(OptNumber(3).is_critical());
    assert!(OptNumber(3).is_unsafe_to_forward());

    // elective, safe-to-forward, no-cache-key (Size1)
    assert!(!OptNumber(60).is_critical());
    assert!(!OptNumber(60).is_unsafe_to_forward());
    assert!(OptNumber(60).is_no_cache_key());

    // elective, safe-to-forward, cache-key (Content-Format)
    assert!(!OptNumber(12).is_no_cache_key());
  }

  #[test]
  fn extend_bytes_with_extended_delta() {
    let opt = Opt { number: OptNumber(60),
                    value: OptValue(vec![1]) };
    let mut bytes = Vec::new();
    opt.extend_bytes(OptNumber(12), &mut bytes);
    assert_eq!(bytes, vec![0b1101_0001, 48 - 13, 1]);
    assert_eq!(opt.wire_size(OptNumber(12)), 3);
  }
}
