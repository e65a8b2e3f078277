use std_alloc::string::String;
use std_alloc::vec::Vec;
use tadpole_common::Cursor;

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use crate::from_bytes::TryConsumeBytes;
use crate::TryFromBytes;

/// Application data carried after the options, e.g. a resource representation
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(pub Vec<u8>);

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl From<u8> for Byte1 {
  fn from(b: u8) -> Self {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Byte1 { ver: Version(ver),
            ty: Type::from(ty),
            tkl }
  }
}

/// # `Message` struct
/// Low-level representation of a CoAP message (PDU).
///
/// Options are kept in the order they were added. Repeatable options
/// (e.g. each segment of the Uri-Path) keep their relative order;
/// serialization always emits options sorted by number, as the delta
/// encoding requires.
///
/// ```
/// use tadpole_msg::*;
///
/// let mut msg = Message::new(Type::Con, Code::new(0, 1), Id(1), Token::default());
/// msg.set_path("sensors/temp");
/// msg.add(known::CONTENT_FORMAT, OptValue(vec![50]));
///
/// assert_eq!(msg.path().unwrap(), "sensors/temp");
///
/// let bytes: Vec<u8> = msg.clone().try_into_bytes().unwrap();
/// assert_eq!(Message::try_from_bytes(bytes).unwrap(), msg);
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`opt::Opt`] for details
  pub opts: Vec<Opt>,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a message with no options and no payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           ty,
           code,
           token,
           ver: Version::default(),
           opts: Vec::new(),
           payload: Payload::default() }
  }

  /// Create an empty ACK for this message
  pub fn ack(&self) -> Self {
    Self::new(Type::Ack, Code::EMPTY, self.id, Token::default())
  }

  /// Create an empty RST for this message
  pub fn reset(&self) -> Self {
    Self::new(Type::Reset, Code::EMPTY, self.id, Token::default())
  }

  /// Options sorted by number, in the order they will be written
  pub fn sorted_opts(&self) -> Vec<&Opt> {
    let mut opts = self.opts.iter().collect::<Vec<_>>();
    // stable; repeated options keep their relative order
    opts.sort_by_key(|o| o.number);
    opts
  }

  /// Append an option (options may repeat)
  pub fn add(&mut self, number: OptNumber, value: OptValue) {
    self.opts.push(Opt { number, value });
  }

  /// Replace all instances of an option with a single value
  pub fn set(&mut self, number: OptNumber, value: OptValue) {
    self.remove(number);
    self.add(number, value);
  }

  /// Remove all instances of an option
  pub fn remove(&mut self, number: OptNumber) {
    self.opts.retain(|o| o.number != number);
  }

  /// Get the first value of an option
  pub fn get(&self, number: OptNumber) -> Option<&OptValue> {
    self.get_all(number).next()
  }

  /// Iterate over every value of an option
  pub fn get_all(&self, number: OptNumber) -> impl Iterator<Item = &OptValue> {
    self.opts
        .iter()
        .filter(move |o| o.number == number)
        .map(|o| &o.value)
  }

  /// The first value of an unsigned integer option
  pub fn get_uint(&self, number: OptNumber) -> Option<u64> {
    self.get(number)
        .and_then(|v| decode_option(number, &v.0).ok())
        .and_then(|v| v.as_uint())
  }

  /// Set an unsigned integer option, using the smallest encoding
  pub fn set_uint(&mut self, number: OptNumber, n: u64) -> Result<(), OptionCodecError> {
    let value = encode_option(number, &OptionValue::Uint(n))?;
    self.set(number, value);
    Ok(())
  }

  /// The Uri-Path segments joined with `/`
  ///
  /// `Err` if a segment is not UTF-8.
  pub fn path(&self) -> Result<String, core::str::Utf8Error> {
    let mut path = String::new();
    for (ix, seg) in self.get_all(known::URI_PATH).enumerate() {
      if ix > 0 {
        path.push('/');
      }
      path.push_str(core::str::from_utf8(&seg.0)?);
    }

    Ok(path)
  }

  /// Replace the Uri-Path with the segments of `path`.
  ///
  /// Leading, trailing and repeated `/` are ignored.
  pub fn set_path(&mut self, path: &str) {
    self.remove(known::URI_PATH);
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .for_each(|seg| self.add(known::URI_PATH, OptValue(seg.as_bytes().to_vec())));
  }

  /// The Observe option, if present and well-formed
  pub fn observe(&self) -> Option<u32> {
    self.get_uint(known::OBSERVE).map(|n| n as u32)
  }

  /// The Content-Format option, if present and well-formed
  pub fn content_format(&self) -> Option<known::ContentFormat> {
    self.get_uint(known::CONTENT_FORMAT)
        .map(|n| known::ContentFormat::from(n as u16))
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next().ok_or_else(MessageParseError::eof)?.into();

    if ver != Version::default() {
      return Err(Self::Error::InvalidVersion(ver.0));
    }

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code_byte = bytes.next().ok_or_else(MessageParseError::eof)?;
    let code = Code::from(code_byte);
    if code.is_reserved() {
      return Err(Self::Error::InvalidCode(code_byte));
    }

    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .and_then(Token::try_from_slice)
                     .ok_or_else(MessageParseError::eof)?;

    let opts = Vec::<Opt>::try_consume_bytes(&mut bytes)?;

    let payload = match bytes.next() {
      | None => Payload::default(),
      | Some(_marker) if bytes.is_exhausted() => return Err(Self::Error::EmptyPayload),
      | Some(_marker) => Payload(bytes.take_until_end().to_vec()),
    };

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_msg() {
    let (expect, msg) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&msg).unwrap(), expect)
  }

  #[test]
  fn parse_byte1() {
    let byte = 0b_01_10_0011u8;
    let byte = Byte1::from(byte);
    assert_eq!(byte,
               Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 })
  }

  #[test]
  fn parse_id() {
    let mut id_bytes = Cursor::new(34u16.to_be_bytes());
    let id = Id::try_consume_bytes(&mut id_bytes).unwrap();
    assert_eq!(id, Id(34));
  }

  #[test]
  fn parse_rejects_long_token() {
    let bytes = [0b_01_00_1001u8, 0b0000_0001, 0, 1];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::InvalidTokenLength(9)));
  }

  #[test]
  fn parse_rejects_reserved_code() {
    let bytes = [0b_01_00_0000u8, 0b0010_0000, 0, 1];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::InvalidCode(0b0010_0000)));
  }

  #[test]
  fn parse_rejects_truncated() {
    let (_, bytes) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&bytes[..3]),
               Err(MessageParseError::UnexpectedEndOfStream));
    assert_eq!(Message::try_from_bytes(&bytes[..6]),
               Err(MessageParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn parse_rejects_marker_without_payload() {
    let bytes = [0b_01_01_0000u8, 0b0100_0101, 0, 1, 0xFF];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::EmptyPayload));
  }

  #[test]
  fn path_segments() {
    let mut msg = Message::new(Type::Non, Code::new(0, 1), Id(0), Token::default());
    msg.set_path("/a//b/c/");
    assert_eq!(msg.get_all(known::URI_PATH).count(), 3);
    assert_eq!(msg.path().unwrap(), "a/b/c");
  }

  #[test]
  fn sorted_opts_are_stable() {
    let mut msg = Message::new(Type::Non, Code::new(0, 1), Id(0), Token::default());
    msg.add(known::URI_QUERY, OptValue(b"q".to_vec()));
    msg.add(known::URI_PATH, OptValue(b"a".to_vec()));
    msg.add(known::CONTENT_FORMAT, OptValue(vec![0]));
    msg.add(known::URI_PATH, OptValue(b"b".to_vec()));

    let order = msg.sorted_opts()
                   .into_iter()
                   .map(|o| (o.number.0, o.value.0.clone()))
                   .collect::<Vec<_>>();

    assert_eq!(order,
               vec![(11, b"a".to_vec()),
                    (11, b"b".to_vec()),
                    (12, vec![0]),
                    (15, b"q".to_vec())]);
  }
}
