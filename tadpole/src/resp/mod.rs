use tadpole_msg::{known, Code, OptNumber, OptionValue};

/// Response codes
pub mod code;

/// What a resource handler answers with.
///
/// The server turns this into a message addressed to the requester,
/// picking type, id and token itself; handlers only choose the
/// code, payload and options.
///
/// ```
/// use tadpole::msg::known::{self, ContentFormat};
/// use tadpole::msg::OptionValue;
/// use tadpole::resp::{code, Resp};
///
/// let resp = Resp::new(code::CONTENT).payload(r#"{"temp": 23.5}"#)
///                                    .content_format(ContentFormat::Json);
///
/// assert_eq!(resp.code(), code::CONTENT);
/// assert_eq!(resp.payload_bytes(), br#"{"temp": 23.5}"#);
/// assert_eq!(resp.options(),
///            &[(known::CONTENT_FORMAT, OptionValue::Uint(50))]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resp {
  code: Code,
  payload: Vec<u8>,
  opts: Vec<(OptNumber, OptionValue)>,
}

impl Default for Resp {
  fn default() -> Self {
    Self::new(code::CONTENT)
  }
}

impl Resp {
  /// Create a response with no payload and no options
  pub fn new(code: Code) -> Self {
    Self { code,
           payload: Vec::new(),
           opts: Vec::new() }
  }

  /// 2.05 Content with a payload
  pub fn content(payload: impl AsRef<[u8]>) -> Self {
    Self::new(code::CONTENT).payload(payload)
  }

  /// Replace the payload
  pub fn payload(mut self, payload: impl AsRef<[u8]>) -> Self {
    self.set_payload(payload);
    self
  }

  /// Add an option (options may repeat)
  pub fn option(mut self, number: OptNumber, value: impl Into<OptionValue>) -> Self {
    self.add_option(number, value);
    self
  }

  /// Set the Content-Format option
  pub fn content_format(mut self, format: known::ContentFormat) -> Self {
    self.opts.retain(|(n, _)| *n != known::CONTENT_FORMAT);
    self.add_option(known::CONTENT_FORMAT, OptionValue::Uint(u16::from(format) as u64));
    self
  }

  /// Change the response code
  pub fn set_code(&mut self, code: Code) {
    self.code = code;
  }

  /// Replace the payload
  pub fn set_payload(&mut self, payload: impl AsRef<[u8]>) {
    self.payload = payload.as_ref().to_vec();
  }

  /// Add an option (options may repeat)
  pub fn add_option(&mut self, number: OptNumber, value: impl Into<OptionValue>) {
    self.opts.push((number, value.into()));
  }

  /// Get the response code
  pub fn code(&self) -> Code {
    self.code
  }

  /// Get the payload's raw bytes
  pub fn payload_bytes(&self) -> &[u8] {
    &self.payload
  }

  /// Options, in the order they were added
  pub fn options(&self) -> &[(OptNumber, OptionValue)] {
    &self.opts
  }

  pub(crate) fn into_parts(self) -> (Code, Vec<u8>, Vec<(OptNumber, OptionValue)>) {
    (self.code, self.payload, self.opts)
  }
}
