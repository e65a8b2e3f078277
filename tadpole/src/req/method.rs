use tadpole_msg::Code;

use crate::code;

/// Request method
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method(pub(super) Code);

impl Default for Method {
  fn default() -> Self {
    Self::GET
  }
}

impl core::fmt::Debug for Method {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}", self)
  }
}

impl core::fmt::Display for Method {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let s = match self.0 {
      | c if c == Self::GET.0 => "GET",
      | c if c == Self::POST.0 => "POST",
      | c if c == Self::PUT.0 => "PUT",
      | c if c == Self::DELETE.0 => "DELETE",
      | c if c == Code::EMPTY => "EMPTY",
      | c => return write!(f, "UNKNOWN({})", c),
    };

    f.write_str(s)
  }
}

impl Method {
  /// The method of a request code; `None` for codes that
  /// are not one of the four methods
  ///
  /// ```
  /// use tadpole::msg::Code;
  /// use tadpole::req::Method;
  ///
  /// assert_eq!(Method::from_code(Code::new(0, 3)), Some(Method::PUT));
  /// assert_eq!(Method::from_code(Code::new(0, 5)), None);
  /// assert_eq!(Method::from_code(Code::new(2, 5)), None);
  /// ```
  pub fn from_code(code: Code) -> Option<Self> {
    [Self::GET, Self::POST, Self::PUT, Self::DELETE].into_iter()
                                                    .find(|m| m.0 == code)
  }

  /// Get the code of this method
  pub fn code(&self) -> Code {
    self.0
  }

  code!(rfc7252("5.8.1") GET    = Method(0*01));
  code!(rfc7252("5.8.2") POST   = Method(0*02));
  code!(rfc7252("5.8.3") PUT    = Method(0*03));
  code!(rfc7252("5.8.4") DELETE = Method(0*04));
}
