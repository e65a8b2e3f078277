use core::fmt::Write;

use tadpole_common::Writable;
use tadpole_msg::Message;

/// One-line description of a message, e.g. `Request: Con 0.01 with 0 byte payload`
pub(crate) fn msg_summary(msg: &Message) -> Writable<[u8; 64]> {
  let mut buf: Writable<[u8; 64]> = Default::default();
  write!(buf,
         "{:?}: {:?} {} with {} byte payload",
         msg.code.kind(),
         msg.ty,
         msg.code,
         msg.payload.0.len()).ok();
  buf
}

#[cfg(test)]
mod test {
  use tadpole_msg::{Code, Id, Payload, Token, Type};

  use super::*;

  #[test]
  fn summary() {
    let mut msg = Message::new(Type::Non, Code::new(2, 5), Id(1), Token::default());
    msg.payload = Payload(b"23.5".to_vec());

    assert_eq!(msg_summary(&msg).as_str(),
               "Response: Non 2.05 with 4 byte payload");
  }
}
