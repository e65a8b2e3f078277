use std_alloc::vec::Vec;

use crate::*;

/// Errors building or parsing a whole message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageError {
  /// A token may be at most 8 bytes
  TokenTooLong(usize),
  /// The code's class is reserved
  InvalidCode(Code),
  /// One of the caller-supplied options could not be encoded
  Option(OptionCodecError),
  /// The datagram ended before the message did
  TruncatedPdu,
  /// Any other structural problem with the datagram
  MalformedMessage(MessageParseError),
}

impl core::fmt::Display for MessageError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::TokenTooLong(n) => write!(f, "token is {} bytes, at most 8 allowed", n),
      | Self::InvalidCode(c) => write!(f, "code {} is reserved", c),
      | Self::Option(e) => write!(f, "{}", e),
      | Self::TruncatedPdu => write!(f, "truncated message"),
      | Self::MalformedMessage(e) => write!(f, "malformed message: {}", e),
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for MessageError {}

impl From<OptionCodecError> for MessageError {
  fn from(e: OptionCodecError) -> Self {
    Self::Option(e)
  }
}

impl From<MessageParseError> for MessageError {
  fn from(e: MessageParseError) -> Self {
    match e {
      | MessageParseError::UnexpectedEndOfStream => Self::TruncatedPdu,
      | MessageParseError::InvalidCode(b) => Self::InvalidCode(Code::from(b)),
      | e => Self::MalformedMessage(e),
    }
  }
}

/// A known option that was dropped while parsing because its value
/// did not fit the option's kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedOption {
  /// The option as it appeared on the wire
  pub opt: Opt,
  /// Why it was dropped
  pub error: OptionCodecError,
}

/// Output of [`parse_message`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
  /// The message, minus any skipped options
  pub message: Message,
  /// Options removed from `message`, in wire order
  pub skipped: Vec<SkippedOption>,
}

/// Assemble a ready-to-send message from its fields, encoding every
/// option with [`encode_option`].
///
/// Options are stored sorted by number; options sharing a number keep
/// the order they were given in.
///
/// ```
/// use tadpole_msg::codec::{build_message, MessageError};
/// use tadpole_msg::{Code, Id, Type};
///
/// let too_long = build_message(Type::Con, &[0; 9], Id(1), Code::new(0, 1), vec![], vec![]);
/// assert_eq!(too_long, Err(MessageError::TokenTooLong(9)));
/// ```
pub fn build_message(ty: Type,
                     token: &[u8],
                     id: Id,
                     code: Code,
                     payload: Vec<u8>,
                     options: Vec<(OptNumber, OptionValue)>)
                     -> Result<Message, MessageError> {
  let token = Token::try_from_slice(token).ok_or(MessageError::TokenTooLong(token.len()))?;

  if code.is_reserved() {
    return Err(MessageError::InvalidCode(code));
  }

  let mut opts = options.into_iter()
                        .map(|(number, value)| {
                          encode_option(number, &value).map(|value| Opt { number, value })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
  opts.sort_by_key(|o| o.number);

  let mut msg = Message::new(ty, code, id, token);
  msg.opts = opts;
  msg.payload = Payload(payload);

  Ok(msg)
}

/// Parse a datagram into a message, then check every known option
/// against its kind with [`decode_option`].
///
/// A known option whose value is malformed does not fail the message;
/// it is removed and reported in [`Parsed::skipped`] so that the rest of
/// the message can still be used. Options this crate does not know
/// are kept as opaque bytes.
pub fn parse_message(raw: &[u8]) -> Result<Parsed, MessageError> {
  let mut message = Message::try_from_bytes(raw)?;
  let mut skipped = Vec::new();

  message.opts.retain(|opt| match decode_option(opt.number, &opt.value.0) {
                  | Ok(_) | Err(OptionCodecError::UnknownOptionKey(_)) => true,
                  | Err(error) => {
                    skipped.push(SkippedOption { opt: opt.clone(),
                                                 error });
                    false
                  },
                });

  Ok(Parsed { message, skipped })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn build_sorts_and_encodes() {
    let msg = build_message(Type::Non,
                            &[9, 9],
                            Id(3),
                            Code::new(0, 3),
                            b"on".to_vec(),
                            vec![(known::CONTENT_FORMAT, OptionValue::Uint(0)),
                                 (known::URI_PATH, OptionValue::from("led")),
                                 (known::URI_PATH, OptionValue::from("1"))]).unwrap();

    assert_eq!(msg.opts
                  .iter()
                  .map(|o| (o.number, o.value.0.clone()))
                  .collect::<Vec<_>>(),
               vec![(known::URI_PATH, b"led".to_vec()),
                    (known::URI_PATH, b"1".to_vec()),
                    (known::CONTENT_FORMAT, vec![0])]);
    assert_eq!(msg.token.as_bytes(), &[9, 9]);
    assert_eq!(msg.payload.0, b"on");
  }

  #[test]
  fn build_rejects_long_token() {
    let eight = build_message(Type::Con, &[1; 8], Id(0), Code::new(0, 1), vec![], vec![]);
    assert!(eight.is_ok());

    let nine = build_message(Type::Con, &[1; 9], Id(0), Code::new(0, 1), vec![], vec![]);
    assert_eq!(nine, Err(MessageError::TokenTooLong(9)));
  }

  #[test]
  fn build_rejects_reserved_code() {
    let msg = build_message(Type::Con, &[], Id(0), Code::new(6, 0), vec![], vec![]);
    assert_eq!(msg, Err(MessageError::InvalidCode(Code::new(6, 0))));
  }

  #[test]
  fn build_rejects_bad_option() {
    let msg = build_message(Type::Con,
                            &[],
                            Id(0),
                            Code::new(0, 1),
                            vec![],
                            vec![(known::SIZE1, OptionValue::Uint(1 << 40))]);
    assert_eq!(msg,
               Err(MessageError::Option(OptionCodecError::ValueTooLarge { number: known::SIZE1,
                                                                          value: 1 << 40 })));
  }

  #[test]
  fn parse_roundtrip() {
    let msg = build_message(Type::Con,
                            &[0xAB],
                            Id(0xBEEF),
                            Code::new(2, 5),
                            b"23.5".to_vec(),
                            vec![(known::OBSERVE, OptionValue::Uint(12)),
                                 (known::ETAG, OptionValue::from(&[1u8, 2][..]))]).unwrap();
    let bytes = msg.clone().try_into_bytes().unwrap();

    let parsed = parse_message(&bytes).unwrap();
    assert_eq!(parsed.message, msg);
    assert!(parsed.skipped.is_empty());
  }

  #[test]
  fn parse_skips_malformed_option_and_continues() {
    let mut msg = Message::new(Type::Con, Code::new(0, 1), Id(1), Token::default());
    msg.add(known::URI_PATH, OptValue(b"temp".to_vec()));
    // 3-byte Content-Format is malformed
    msg.add(known::CONTENT_FORMAT, OptValue(vec![0, 0, 50]));
    msg.add(known::ACCEPT, OptValue(vec![50]));
    msg.add(OptNumber(2048), OptValue(vec![7]));
    let bytes = msg.try_into_bytes().unwrap();

    let Parsed { message, skipped } = parse_message(&bytes).unwrap();

    assert_eq!(message.path().unwrap(), "temp");
    assert_eq!(message.get_uint(known::ACCEPT), Some(50));
    assert_eq!(message.get(OptNumber(2048)), Some(&OptValue(vec![7])));
    assert_eq!(message.get(known::CONTENT_FORMAT), None);
    assert_eq!(skipped,
               vec![SkippedOption { opt: Opt { number: known::CONTENT_FORMAT,
                                               value: OptValue(vec![0, 0, 50]) },
                                    error: OptionCodecError::MalformedLength { number:
                                                                                 known::CONTENT_FORMAT,
                                                                               len: 3 } }]);
  }

  #[test]
  fn parse_errors() {
    assert_eq!(parse_message(&[0b0100_0000, 1]), Err(MessageError::TruncatedPdu));
    assert_eq!(parse_message(&[0b0100_0000, 0b1110_0000, 0, 1]),
               Err(MessageError::InvalidCode(Code::new(7, 0))));
    assert_eq!(parse_message(&[0b0100_1001, 1, 0, 1]),
               Err(MessageError::MalformedMessage(MessageParseError::InvalidTokenLength(9))));
    assert_eq!(parse_message(&[0b1000_0000, 1, 0, 1]),
               Err(MessageError::MalformedMessage(MessageParseError::InvalidVersion(2))));
  }
}
