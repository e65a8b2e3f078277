//! Low-level representation of CoAP messages.
//!
//! The most notable item in `tadpole_msg` is [`Message`];
//! a CoAP message very close to the actual byte layout,
//! that can be read from and written to datagrams with
//! [`TryFromBytes`] and [`TryIntoBytes`].
//!
//! On top of the wire format sit two codecs:
//! - the **option codec** ([`encode_option`], [`decode_option`]) which knows
//!   what kind of value each option number carries (string, opaque bytes,
//!   or a minimal-length big-endian unsigned integer)
//! - the **message codec** ([`codec::build_message`], [`codec::parse_message`])
//!   which validates a whole PDU's fields and options in one go
//!
//! ```
//! use tadpole_msg::codec::{build_message, parse_message};
//! use tadpole_msg::{known, Code, Id, OptionValue, TryIntoBytes, Type};
//!
//! let msg = build_message(Type::Con,
//!                         &[1, 2],
//!                         Id(7),
//!                         Code::new(0, 1),
//!                         vec![],
//!                         vec![(known::URI_PATH, OptionValue::from("status")),
//!                              (known::CONTENT_FORMAT, OptionValue::Uint(0))]).unwrap();
//!
//! let bytes: Vec<u8> = msg.clone().try_into_bytes().unwrap();
//! let parsed = parse_message(&bytes).unwrap();
//!
//! assert_eq!(parsed.message, msg);
//! assert!(parsed.skipped.is_empty());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![deny(missing_docs)]

extern crate alloc as std_alloc;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

/// Whole-message validation on top of the wire format
pub mod codec;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::TryIntoBytes;

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  //                                  ver type tkl  code 2.05  id = 1
  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let content_format: &[u8] = &[50];
  let options: [&[u8]; 2] = [&[0b_1100_0001u8], content_format];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token(tinyvec::array_vec!([u8; 8] => 254)),
                      opts: vec![Opt { number: OptNumber(12),
                                       value: OptValue(content_format.to_vec()) }],
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}

#[cfg(test)]
pub(crate) mod tests {
  /// Assert two values are equal, printing them in binary on failure
  #[macro_export]
  macro_rules! assert_eqb {
    ($actual:expr, $expected:expr) => {
      if $actual != $expected {
        panic!("expected {:08b} to equal {:08b}", $actual, $expected)
      }
    };
  }

  /// Assert two byte iterables are equal, printing them in binary on failure
  #[macro_export]
  macro_rules! assert_eqb_iter {
    ($actual:expr, $expected:expr) => {
      if $actual.iter().ne($expected.iter()) {
        panic!("expected {:?} to equal {:?}",
               $actual.into_iter()
                      .map(|b| format!("{:08b}", b))
                      .collect::<Vec<_>>(),
               $expected.into_iter()
                        .map(|b| format!("{:08b}", b))
                        .collect::<Vec<_>>())
      }
    };
  }
}
