use std_alloc::vec::Vec;
use tinyvec::ArrayVec;

use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert into a datagram
  ///
  /// ```
  /// use tadpole_msg::{Code, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let msg = Message::new(Type::Con, Code::new(0, 1), Id(0), Token::default());
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  ///
  /// assert_eq!(bytes, vec![0b0100_0000, 0b0000_0001, 0, 0]);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// An option value is longer than the wire format can express
  OptionTooLong {
    /// option number
    number: u16,
    /// length of the value
    len: usize,
  },
}

impl core::fmt::Display for MessageToBytesError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::OptionTooLong { number, len } => {
        write!(f, "option {} has a {} byte value", number, len)
      },
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for MessageToBytesError {}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    let opts = self.sorted_opts();

    if let Some(o) = opts.iter().find(|o| o.value.0.len() > u16::MAX as usize) {
      return Err(Self::Error::OptionTooLong { number: o.number.0,
                                              len: o.value.0.len() });
    }

    let mut prev = OptNumber(0);
    let opts_size: usize = opts.iter()
                               .map(|o| {
                                 let size = o.wire_size(prev);
                                 prev = o.number;
                                 size
                               })
                               .sum();

    let mut bytes = Vec::with_capacity(4 + self.token.0.len() + opts_size + 1 + self.payload.0.len());

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);
    bytes.extend(id);
    bytes.extend(self.token.0);

    let mut prev = OptNumber(0);
    for opt in opts {
      opt.extend_bytes(prev, &mut bytes);
      prev = opt.number;
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b11111111);
      bytes.extend(self.payload.0);
    }

    Ok(bytes)
  }
}

pub(crate) fn opt_len_or_delta(val: u16) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend((n - 269).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}
