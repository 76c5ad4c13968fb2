use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VouchError;

/// Length in bytes of an agent identity (an Ed25519 public key).
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length in bytes of a block content hash (SHA-256).
pub const BLOCK_HASH_LEN: usize = 32;

/// Opaque identity of an agent on the network.
///
/// Identities compare and hash by their raw bytes. Hex and base64 are
/// presentation-layer encodings only; two keys are the same agent exactly
/// when their bytes are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VouchError> {
        let bytes: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| VouchError::InvalidLength {
                what: "public key",
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, VouchError> {
        let bytes = hex::decode(s).map_err(|_| VouchError::InvalidEncoding {
            what: "public key",
            value: s.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Short display form: the first eight base64 characters.
    pub fn short(&self) -> String {
        let mut encoded = self.to_base64();
        encoded.truncate(8);
        encoded
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(@{})", self.short())
    }
}

// Keys travel as hex strings in JSON so they can double as object keys.
impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 digest identifying one side of a bilateral record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; BLOCK_HASH_LEN]);

impl BlockHash {
    pub fn new(bytes: [u8; BLOCK_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VouchError> {
        let bytes: [u8; BLOCK_HASH_LEN] =
            bytes.try_into().map_err(|_| VouchError::InvalidLength {
                what: "block hash",
                expected: BLOCK_HASH_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, VouchError> {
        let bytes = hex::decode(s).map_err(|_| VouchError::InvalidEncoding {
            what: "block hash",
            value: s.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// The all-zero hash, used as the previous-hash of a genesis block.
    pub fn zeroed() -> Self {
        Self([0u8; BLOCK_HASH_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", &self.to_hex()[..12])
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fill: u8) -> PublicKey {
        PublicKey::new([fill; PUBLIC_KEY_LEN])
    }

    #[test]
    fn test_equality_is_by_bytes() {
        assert_eq!(key(1), key(1));
        assert_ne!(key(1), key(2));
    }

    #[test]
    fn test_hex_round_trip() {
        let k = key(0xAB);
        let parsed = PublicKey::from_hex(&k.to_hex()).unwrap();
        assert_eq!(k, parsed);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = PublicKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, VouchError::InvalidLength { actual: 16, .. }));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        let err = PublicKey::from_hex("not hex").unwrap_err();
        assert!(matches!(err, VouchError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_short_form_is_eight_chars() {
        assert_eq!(key(7).short().len(), 8);
    }

    #[test]
    fn test_serde_uses_hex_strings() {
        let k = key(0x42);
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, format!("\"{}\"", k.to_hex()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(k, back);
    }

    #[test]
    fn test_zeroed_hash_is_all_zero() {
        assert_eq!(BlockHash::zeroed().as_bytes(), &[0u8; BLOCK_HASH_LEN]);
    }
}
