//! Security settings shared by every transport that can run over (D)TLS.
//!
//! Values are plain data; nothing here performs cryptography. The
//! [`Socket`](crate::net::Socket) implementation consumes them when it
//! performs a handshake.
//!
//! Both types deserialize from the JSON shape used by device configuration
//! files. Certificates and keys may be given either as PEM text or as
//! arrays of bytes:
//!
//! ```
//! use tadpole::ssl::{SeAlgorithm, SslConfig, VerifyCert};
//!
//! let cfg: SslConfig = serde_json::from_str(r#"{
//!   "ca_cert": "-----BEGIN CERTIFICATE-----...",
//!   "client_key": [1, 2, 3],
//!   "verify_cert": "optional",
//!   "use_se": true,
//!   "se_config": { "key_id": 7, "key_algo": "ecc_sec_p256r1" }
//! }"#).unwrap();
//!
//! assert_eq!(cfg.client_key, Some(vec![1, 2, 3]));
//! assert_eq!(cfg.verify_cert, VerifyCert::Optional);
//! assert_eq!(cfg.se_config.map(|se| se.key_algo), Some(SeAlgorithm::EccSecP256r1));
//! ```

use serde::{Deserialize, Deserializer};

/// How strictly the peer's certificate is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyCert {
  /// Do not verify
  None,
  /// Verify if presented
  Optional,
  /// Fail the handshake unless the certificate verifies
  Required,
}

impl Default for VerifyCert {
  fn default() -> Self {
    Self::None
  }
}

/// Key algorithms a secure element may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[allow(missing_docs)]
pub enum SeAlgorithm {
  #[serde(rename = "aes128")]
  Aes128,
  #[serde(rename = "aes192")]
  Aes192,
  #[serde(rename = "aes256")]
  Aes256,
  #[serde(rename = "rsa1024")]
  Rsa1024,
  #[serde(rename = "rsa2048", alias = "rsa2018")]
  Rsa2048,
  #[serde(rename = "ecc_brainpool")]
  EccBrainpool,
  #[serde(rename = "ecc_brainpool_p256r1")]
  EccBrainpoolP256r1,
  #[serde(rename = "ecc_sec")]
  EccSec,
  #[serde(rename = "ecc_sec_p256r1")]
  EccSecP256r1,
  #[serde(rename = "ecc_sec_p384r1")]
  EccSecP384r1,
  #[serde(rename = "ecc_sec_p521r1")]
  EccSecP521r1,
  #[serde(rename = "hmac")]
  Hmac,
  #[serde(rename = "dh_1024")]
  Dh1024,
  #[serde(rename = "dh_1024_5114")]
  Dh1024Rfc5114,
  #[serde(rename = "dh_2048")]
  Dh2048,
  #[serde(rename = "dh_2048_5114")]
  Dh2048Rfc5114,
}

impl SeAlgorithm {
  /// The configuration-file spelling of this algorithm
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Aes128 => "aes128",
      | Self::Aes192 => "aes192",
      | Self::Aes256 => "aes256",
      | Self::Rsa1024 => "rsa1024",
      | Self::Rsa2048 => "rsa2048",
      | Self::EccBrainpool => "ecc_brainpool",
      | Self::EccBrainpoolP256r1 => "ecc_brainpool_p256r1",
      | Self::EccSec => "ecc_sec",
      | Self::EccSecP256r1 => "ecc_sec_p256r1",
      | Self::EccSecP384r1 => "ecc_sec_p384r1",
      | Self::EccSecP521r1 => "ecc_sec_p521r1",
      | Self::Hmac => "hmac",
      | Self::Dh1024 => "dh_1024",
      | Self::Dh1024Rfc5114 => "dh_1024_5114",
      | Self::Dh2048 => "dh_2048",
      | Self::Dh2048Rfc5114 => "dh_2048_5114",
    }
  }
}

impl core::fmt::Display for SeAlgorithm {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where the client key lives when a secure element is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct SeConfig {
  /// Slot of the key in the secure element
  pub key_id: u32,
  /// Algorithm of the key in that slot
  pub key_algo: SeAlgorithm,
}

/// X.509 settings for a (D)TLS session
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SslConfig {
  /// Trusted root certificate(s)
  #[serde(deserialize_with = "bytes::deserialize_opt")]
  pub ca_cert: Option<Vec<u8>>,
  /// Our certificate
  #[serde(deserialize_with = "bytes::deserialize_opt")]
  pub client_cert: Option<Vec<u8>>,
  /// Our private key, unless it is held by a secure element
  #[serde(deserialize_with = "bytes::deserialize_opt")]
  pub client_key: Option<Vec<u8>>,
  /// See [`VerifyCert`]
  pub verify_cert: VerifyCert,
  /// Use the key held by a secure element instead of `client_key`
  pub use_se: bool,
  /// Required when `use_se` is set
  pub se_config: Option<SeConfig>,
}

impl SslConfig {
  /// Check that the settings are usable together
  ///
  /// ```
  /// use tadpole::ssl::SslConfig;
  ///
  /// let mut cfg = SslConfig::default();
  /// assert!(cfg.check().is_ok());
  ///
  /// cfg.use_se = true;
  /// assert!(cfg.check().is_err());
  /// ```
  pub fn check(&self) -> Result<(), String> {
    if self.use_se && self.se_config.is_none() {
      return Err("use_se is set but se_config is missing".into());
    }

    if !self.use_se && self.client_key.is_some() && self.client_cert.is_none() {
      return Err("client_key given without client_cert".into());
    }

    if self.verify_cert == VerifyCert::Required && self.ca_cert.is_none() {
      return Err("verify_cert is required but ca_cert is missing".into());
    }

    Ok(())
  }
}

/// Pre-shared key credentials for a DTLS-PSK session
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Psk {
  /// Identity the client presents
  #[serde(deserialize_with = "bytes::deserialize")]
  pub identity: Vec<u8>,
  /// The key itself
  #[serde(deserialize_with = "bytes::deserialize")]
  pub psk: Vec<u8>,
}

impl Psk {
  /// Create credentials
  pub fn new(identity: impl AsRef<[u8]>, psk: impl AsRef<[u8]>) -> Self {
    Self { identity: identity.as_ref().to_vec(),
           psk: psk.as_ref().to_vec() }
  }

  /// Both identity and key must be non-empty
  pub fn check(&self) -> Result<(), String> {
    match (self.identity.is_empty(), self.psk.is_empty()) {
      | (true, _) => Err("psk identity is empty".into()),
      | (_, true) => Err("psk key is empty".into()),
      | _ => Ok(()),
    }
  }
}

impl core::fmt::Debug for Psk {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Psk")
     .field("identity", &String::from_utf8_lossy(&self.identity))
     .field("psk", &format_args!("<{} bytes>", self.psk.len()))
     .finish()
  }
}

mod bytes {
  use super::*;

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Repr {
    Text(String),
    Bytes(Vec<u8>),
  }

  impl From<Repr> for Vec<u8> {
    fn from(r: Repr) -> Vec<u8> {
      match r {
        | Repr::Text(s) => s.into_bytes(),
        | Repr::Bytes(b) => b,
      }
    }
  }

  pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    Repr::deserialize(d).map(Vec::from)
  }

  pub(super) fn deserialize_opt<'de, D: Deserializer<'de>>(d: D)
                                                          -> Result<Option<Vec<u8>>, D::Error> {
    Option::<Repr>::deserialize(d).map(|r| r.map(Vec::from))
  }
}
