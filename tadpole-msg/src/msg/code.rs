/// Message code: a request method, a response status, or "empty"
///
/// Codes are written `class.detail` (e.g. `2.05` for "Content")
/// and packed into one byte as `ccc ddddd`.
///
/// ```
/// use tadpole_msg::Code;
///
/// let content = Code::new(2, 5);
/// assert_eq!(u8::from(content), 69);
/// assert_eq!(Code::from(69u8), content);
/// assert_eq!(content.to_string(), "2.05");
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request (or empty)|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  ///
  /// Classes 1, 6 and 7 are reserved.
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for empty messages, and the method number (`1` GET .. `4` DELETE) for requests.
  pub detail: u8,
}

/// Whether a code is a request, response, or empty message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodeKind {
  /// `0.00`
  Empty,
  /// `0.xx`
  Request,
  /// `2.xx`, `4.xx`, `5.xx`
  Response,
  /// `1.xx`, `6.xx`, `7.xx`
  Reserved,
}

impl Code {
  /// `0.00`, used by empty ACKs, RSTs and pings
  pub const EMPTY: Code = Code::new(0, 0);

  /// Create a new Code
  ///
  /// `class` must be below 8 and `detail` below 32, the widths they
  /// have on the wire. Debug builds panic otherwise; release builds
  /// keep the value and drop the high bits when it is written.
  pub const fn new(class: u8, detail: u8) -> Self {
    debug_assert!(class < 8 && detail < 32, "code out of range");
    Self { class, detail }
  }

  /// Get the human string representation of a message code
  ///
  /// # Returns
  /// A `char` array
  ///
  /// Avoids allocating; `Code` also implements `Display`.
  /// ```
  /// use tadpole_msg::Code;
  ///
  /// let code = Code { class: 2,
  ///                   detail: 5 };
  /// let chars = code.to_human();
  /// let string = String::from_iter(chars);
  /// assert_eq!(string, "2.05".to_string());
  /// ```
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from_digit(d.into(), 10).unwrap_or('?');
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }

  /// Classify this code
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | (2 | 4 | 5, _) => CodeKind::Response,
      | _ => CodeKind::Reserved,
    }
  }

  /// Whether the class of this code is reserved by RFC7252
  pub fn is_reserved(&self) -> bool {
    self.kind() == CodeKind::Reserved
  }

  /// Whether this is a `2.xx` code
  pub fn is_success(&self) -> bool {
    self.class == 2
  }
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    // xxxyyyyy

    // xxx => class
    let class = b >> 5;

    // yyyyy => detail
    let detail = b & 0b0011111;

    Code { class, detail }
  }
}

/// Packs the low 3 bits of the class and the low 5 bits of the detail
impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail & 0b0011111;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_eqb;

  #[test]
  fn parse_code() {
    let code = Code::from(0b0100_0101_u8);
    assert_eq!(code,
               Code { class: 2,
                      detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 4,
                      detail: 4 };
    let actual: u8 = code.into();
    assert_eqb!(actual, 0b1000_0100_u8);
    assert_eq!(actual, 132);
  }

  #[test]
  fn classify() {
    assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
    assert_eq!(Code::new(0, 1).kind(), CodeKind::Request);
    assert_eq!(Code::new(4, 5).kind(), CodeKind::Response);
    assert!(Code::new(1, 0).is_reserved());
    assert!(Code::new(7, 31).is_reserved());
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "code out of range")]
  fn detail_too_wide() {
    Code::new(2, 32);
  }
}
