/// Protocol version, always `1` for RFC7252 messages.
///
/// Messages with any other version are rejected by the parser.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Eq, Ord, Hash)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}
