use tinyvec::ArrayVec;

/// Opaque 0-8 byte correlator binding a response to the request
/// that caused it.
///
/// Every request carries a client-generated token that the server
/// echoes in its response; observe notifications keep repeating the
/// token of the registering request.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Copy `bytes` into a token, or `None` if there are more than 8.
  ///
  /// ```
  /// use tadpole_msg::Token;
  ///
  /// assert_eq!(Token::try_from_slice(&[1, 2, 3]).map(|t| t.0.len()), Some(3));
  /// assert_eq!(Token::try_from_slice(&[0; 9]), None);
  /// ```
  pub fn try_from_slice(bytes: &[u8]) -> Option<Token> {
    ArrayVec::try_from(bytes).ok().map(Token)
  }

  /// Take an arbitrary-length sequence of bytes and turn it into an opaque message token
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change in the future.
  ///
  /// ```
  /// use tadpole_msg::Token;
  ///
  /// let my_token = Token::opaque(&[0, 1, 2]);
  /// assert_eq!(my_token.0.len(), 8);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }

  /// The token's bytes
  pub fn as_bytes(&self) -> &[u8] {
    self.0.as_slice()
  }
}
