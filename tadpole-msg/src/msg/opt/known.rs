use crate::OptNumber;

macro_rules! opts {
  ($($(#[doc = $doc:expr])* $name:ident = $n:literal, $kind:expr;)*) => {
    $(
      $(#[doc = $doc])*
      pub const $name: OptNumber = OptNumber($n);
    )*

    /// The kind of value carried by a known option, or `None`
    /// for option numbers this crate does not know.
    pub fn kind_of(n: OptNumber) -> Option<OptionKind> {
      match n {
        $(| $name => Some($kind),)*
        | _ => None,
      }
    }

    /// The conventional name of a known option
    ///
    /// ```
    /// use tadpole_msg::known;
    ///
    /// assert_eq!(known::name_of(known::URI_PATH), Some("URI_PATH"));
    /// ```
    pub fn name_of(n: OptNumber) -> Option<&'static str> {
      match n {
        $(| $name => Some(stringify!($name)),)*
        | _ => None,
      }
    }
  };
}

/// How the bytes of an option's value are to be interpreted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OptionKind {
  /// Zero-length value; presence is the information
  Empty,
  /// Arbitrary bytes, passed through as-is
  Opaque,
  /// UTF-8 text, passed through as-is (no terminator)
  String,
  /// Unsigned integer, big-endian, in 1, 2 or 4 bytes.
  ///
  /// The field is the maximum width in bytes this option allows.
  Uint(usize),
}

opts! {
  /// Makes a request conditional on the current ETag of the target resource
  IF_MATCH = 1, OptionKind::Opaque;
  /// Internet host of the resource being requested
  URI_HOST = 3, OptionKind::String;
  /// Entity-tag: resource-local identifier for a representation
  ETAG = 4, OptionKind::Opaque;
  /// Makes a request conditional on the target resource not existing
  IF_NONE_MATCH = 5, OptionKind::Empty;
  /// Register (`0`) or deregister (`1`) interest in a resource in requests,
  /// notification sequence number in responses
  OBSERVE = 6, OptionKind::Uint(4);
  /// Transport-layer port of the resource being requested
  URI_PORT = 7, OptionKind::Uint(2);
  /// One segment of the location of a newly created resource
  LOCATION_PATH = 8, OptionKind::String;
  /// One segment of the absolute path of the resource being requested
  URI_PATH = 11, OptionKind::String;
  /// Representation format of the message payload, see [`ContentFormat`]
  CONTENT_FORMAT = 12, OptionKind::Uint(2);
  /// Maximum time in seconds a response may be cached before it is stale
  MAXAGE = 14, OptionKind::Uint(4);
  /// One `key=value` argument parameterizing the resource
  URI_QUERY = 15, OptionKind::String;
  /// Content format acceptable to the client
  ACCEPT = 17, OptionKind::Uint(2);
  /// One argument of the location of a newly created resource
  LOCATION_QUERY = 20, OptionKind::String;
  /// Block-wise transfer of a response payload
  BLOCK2 = 23, OptionKind::Uint(4);
  /// Block-wise transfer of a request payload
  BLOCK1 = 27, OptionKind::Uint(4);
  /// Total size of a response payload transferred block-wise
  SIZE2 = 28, OptionKind::Uint(4);
  /// Absolute URI for a forward-proxy to fetch
  PROXY_URI = 35, OptionKind::String;
  /// Scheme a forward-proxy should use with the Uri-* options
  PROXY_SCHEME = 39, OptionKind::String;
  /// Size of the request payload
  SIZE1 = 60, OptionKind::Uint(4);
}

/// Content-Format values
///
/// ```
/// use tadpole_msg::known::ContentFormat;
///
/// assert_eq!(u16::from(ContentFormat::Json), 50);
/// assert_eq!(ContentFormat::from(40), ContentFormat::LinkFormat);
/// assert_eq!(ContentFormat::from(11050), ContentFormat::Other(11050));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8`
  Text,
  /// `application/link-format`
  LinkFormat,
  /// `application/xml`
  Xml,
  /// `application/octet-stream`
  OctetStream,
  /// `application/exi`
  Exi,
  /// `application/json`
  Json,
  /// `application/cbor`
  Cbor,
  /// Another registered (or private) content format
  Other(u16),
}

impl From<ContentFormat> for u16 {
  fn from(f: ContentFormat) -> u16 {
    use ContentFormat::*;
    match f {
      | Text => 0,
      | LinkFormat => 40,
      | Xml => 41,
      | OctetStream => 42,
      | Exi => 47,
      | Json => 50,
      | Cbor => 60,
      | Other(n) => n,
    }
  }
}

impl From<u16> for ContentFormat {
  fn from(n: u16) -> Self {
    use ContentFormat::*;
    match n {
      | 0 => Text,
      | 40 => LinkFormat,
      | 41 => Xml,
      | 42 => OctetStream,
      | 47 => Exi,
      | 50 => Json,
      | 60 => Cbor,
      | n => Other(n),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds() {
    assert_eq!(kind_of(URI_HOST), Some(OptionKind::String));
    assert_eq!(kind_of(ETAG), Some(OptionKind::Opaque));
    assert_eq!(kind_of(CONTENT_FORMAT), Some(OptionKind::Uint(2)));
    assert_eq!(kind_of(SIZE1), Some(OptionKind::Uint(4)));
    assert_eq!(kind_of(IF_NONE_MATCH), Some(OptionKind::Empty));
    assert_eq!(kind_of(OptNumber(2048)), None);
  }
}
