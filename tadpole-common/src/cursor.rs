/// A read cursor over a byte buffer, used by the PDU decoder
/// to consume a datagram front-to-back without copying it.
///
/// Reads that cannot be satisfied in full yield `None` and
/// leave the position where it was.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor<T> {
  buf: T,
  pos: usize,
}

impl<T: AsRef<[u8]>> Cursor<T> {
  /// Start reading `buf` from its first byte
  pub fn new(buf: T) -> Cursor<T> {
    Cursor { buf, pos: 0 }
  }

  fn rest(&self) -> &[u8] {
    &self.buf.as_ref()[self.pos..]
  }

  /// Take the next byte
  pub fn next(&mut self) -> Option<u8> {
    self.take_exact(1).map(|b| b[0])
  }

  /// Take exactly `n` bytes
  pub fn take_exact(&mut self, n: usize) -> Option<&[u8]> {
    let start = self.pos;
    if self.rest().len() < n {
      return None;
    }

    self.pos += n;
    Some(&self.buf.as_ref()[start..start + n])
  }

  /// Look at the next `n` bytes without consuming them
  pub fn peek_exact(&self, n: usize) -> Option<&[u8]> {
    self.rest().get(..n)
  }

  /// Whether every byte has been consumed
  pub fn is_exhausted(&self) -> bool {
    self.rest().is_empty()
  }

  /// The bytes not yet consumed
  pub fn until_end(&self) -> &[u8] {
    self.rest()
  }

  /// Consume every remaining byte
  pub fn take_until_end(&mut self) -> &[u8] {
    let start = self.pos;
    self.pos = self.buf.as_ref().len();
    &self.buf.as_ref()[start..]
  }

  /// Number of bytes consumed so far
  pub fn position(&self) -> usize {
    self.pos
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn next_until_exhausted() {
    let mut cur = Cursor::new([7u8]);
    assert!(!cur.is_exhausted());
    assert_eq!(cur.next(), Some(7));
    assert_eq!(cur.next(), None);
    assert!(cur.is_exhausted());
  }

  #[test]
  fn short_reads_do_not_move() {
    let mut cur = Cursor::new(vec![1, 2, 3]);
    assert_eq!(cur.take_exact(2), Some(&[1u8, 2][..]));
    assert_eq!(cur.take_exact(2), None);
    assert_eq!(cur.peek_exact(2), None);
    assert_eq!(cur.position(), 2);
    assert_eq!(cur.peek_exact(1), Some(&[3u8][..]));
    assert_eq!(cur.take_exact(1), Some(&[3u8][..]));
  }

  #[test]
  fn payload_after_marker() {
    let mut cur = Cursor::new(vec![0xFF, b'h', b'i']);
    assert_eq!(cur.next(), Some(0xFF));
    assert_eq!(cur.until_end(), b"hi");
    assert_eq!(cur.take_until_end(), b"hi");
    assert!(cur.is_exhausted());
    assert_eq!(cur.take_until_end(), &[] as &[u8]);
  }
}
