use core::fmt::Display;
use core::ops::Deref;

use tinyvec::{Array, ArrayVec};

/// A fixed-capacity text buffer
///
/// Lets log lines be built with `write!` without touching the heap.
/// Writes that would overflow the capacity fail with [`core::fmt::Error`]
/// and leave the buffer as it was.
///
/// ```
/// use core::fmt::Write as _;
///
/// use tadpole_common::Writable;
///
/// let mut line = Writable::<[u8; 16]>::default();
/// write!(line, "{}", 123).unwrap();
///
/// assert_eq!(line.as_str(), "123");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Writable<A: Array<Item = u8>>(ArrayVec<A>);

impl<A: Array<Item = u8>> Default for Writable<A> {
  fn default() -> Self {
    Self(ArrayVec::new())
  }
}

impl<A: Array<Item = u8>> Writable<A> {
  /// Read the buffer as a string slice
  pub fn as_str(&self) -> &str {
    // only whole `&str`s are ever written
    core::str::from_utf8(self.0.as_slice()).unwrap_or_default()
  }
}

impl<A> Display for Writable<A> where A: Array<Item = u8>
{
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl<A: Array<Item = u8>> Deref for Writable<A> {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    self.0.as_slice()
  }
}

impl<A: Array<Item = u8>> AsRef<str> for Writable<A> {
  fn as_ref(&self) -> &str {
    self.as_str()
  }
}

impl<A: Array<Item = u8>> core::fmt::Write for Writable<A> {
  fn write_str(&mut self, s: &str) -> core::fmt::Result {
    if self.0.len() + s.len() > self.0.capacity() {
      Err(core::fmt::Error)
    } else {
      self.0.extend(s.bytes());
      Ok(())
    }
  }
}
