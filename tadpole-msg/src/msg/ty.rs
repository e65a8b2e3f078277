use core::str::FromStr;

/// Reliability semantics of a message
///
/// - `Con`firmable messages are retransmitted until the peer answers
///   with an `Ack` (or a `Reset`).
/// - `Non`-confirmable messages are sent once and never acknowledged,
///   useful for repeated readings where one loss does not matter.
/// - `Ack` acknowledges a specific `Con` message (matched by [`crate::Id`]) and
///   may carry the response to it ("piggy-backed" response).
/// - `Reset` tells the sender that a message was received but could not be
///   processed, e.g. a notification for an observation that no longer exists.
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub enum Type {
  /// Non-confirmable
  Non,
  /// Confirmable
  Con,
  /// Acknowledgement
  Ack,
  /// Reset
  Reset,
}

impl Type {
  /// The conventional short spelling of this type
  ///
  /// ```
  /// use tadpole_msg::Type;
  ///
  /// assert_eq!(Type::Reset.as_str(), "RST");
  /// assert_eq!("CON".parse::<Type>(), Ok(Type::Con));
  /// ```
  pub fn as_str(&self) -> &'static str {
    match self {
      | Type::Con => "CON",
      | Type::Non => "NON",
      | Type::Ack => "ACK",
      | Type::Reset => "RST",
    }
  }
}

impl core::fmt::Display for Type {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A string that did not name a message type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnknownType;

impl FromStr for Type {
  type Err = UnknownType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      | "CON" => Ok(Type::Con),
      | "NON" => Ok(Type::Non),
      | "ACK" => Ok(Type::Ack),
      | "RST" => Ok(Type::Reset),
      | _ => Err(UnknownType),
    }
  }
}

impl From<u8> for Type {
  /// Only the low 2 bits are considered
  fn from(b: u8) -> Self {
    match b & 0b11 {
      | 0 => Type::Con,
      | 1 => Type::Non,
      | 2 => Type::Ack,
      | _ => Type::Reset,
    }
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    match t {
      | Type::Con => 0,
      | Type::Non => 1,
      | Type::Ack => 2,
      | Type::Reset => 3,
    }
  }
}
