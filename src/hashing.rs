//! SHA3-256 digests and `sha3-256:<hex>` hash identifiers
//!
//! Hash values cross the wire as `"sha3-256:<lowercase-hex>"`. No alternate
//! hash is ever accepted under that label, and parsing is strict: exact
//! prefix, exactly 64 lowercase hex digits.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha3::{Digest, Sha3_256};

use crate::canonical::{self, CanonError};

/// Identifier prefix carried in front of every digest on the wire.
pub const HASH_PREFIX: &str = "sha3-256:";

/// SHA3-256 of a byte string.
pub fn sha3_256(bytes: &[u8]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    h.update(bytes);
    h.finalize().into()
}

/// Errors from parsing a hash identifier string.
#[derive(Debug, thiserror::Error)]
pub enum HashIdError {
    /// Identifier did not start with `sha3-256:`.
    #[error("hash identifier must start with \"{HASH_PREFIX}\"")]
    BadPrefix,
    /// Hex payload was not exactly 64 lowercase hex digits.
    #[error("hash identifier must carry exactly 64 lowercase hex digits")]
    BadHex,
}

/// A SHA3-256 digest carried as `sha3-256:<lowercase-hex>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashId(pub [u8; 32]);

impl HashId {
    /// Digest of a raw byte string.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(sha3_256(bytes))
    }

    /// Digest of the canonical encoding of a structured value.
    pub fn of_value(value: &Value) -> Result<Self, CanonError> {
        Ok(Self::of_bytes(&canonical::encode(value)?))
    }

    /// Strict parse of the `sha3-256:<hex>` form.
    pub fn parse(s: &str) -> Result<Self, HashIdError> {
        let hex_part = s.strip_prefix(HASH_PREFIX).ok_or(HashIdError::BadPrefix)?;
        if hex_part.len() != 64 || !hex_part.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(HashIdError::BadHex);
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut out).map_err(|_| HashIdError::BadHex)?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for HashId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", HASH_PREFIX, hex::encode(self.0))
    }
}

impl std::str::FromStr for HashId {
    type Err = HashIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HashId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HashId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
