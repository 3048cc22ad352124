//! Integrity engine: SHA-256 digests with strong types.
//!
//! Every digest in an EYP package (cover document, attachments) uses the
//! same algorithm. There is no fallback to a weaker checksum.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Compute the lowercase hex SHA-256 digest of `data`.
pub fn digest(data: &[u8]) -> String {
    Sha256Digest::hash(data).to_hex()
}

/// The digest algorithm used throughout the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
}

impl DigestAlgorithm {
    /// Wire name of the algorithm.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
        }
    }

    /// Parse a wire name. Accepts the common spellings of SHA-256.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" | "SHA2-256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the SHA-256 digest of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string (either case).
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s.trim())?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The algorithm that produced this digest.
    pub const fn algorithm(&self) -> DigestAlgorithm {
        DigestAlgorithm::Sha256
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_vector() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_deterministic() {
        let h1 = Sha256Digest::hash(b"test");
        let h2 = Sha256Digest::hash(b"test");
        assert_eq!(h1, h2);

        let h3 = Sha256Digest::hash(b"different");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hex_roundtrip_ignores_case() {
        let h = Sha256Digest::hash(b"hello");
        let upper = h.to_hex().to_uppercase();
        assert_eq!(Sha256Digest::from_hex(&upper).unwrap(), h);
        assert!(Sha256Digest::from_hex("abcd").is_err());
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(DigestAlgorithm::parse("sha256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::parse("SHA-256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::parse("MD5"), None);
        assert_eq!(
            serde_json::to_string(&DigestAlgorithm::Sha256).unwrap(),
            "\"SHA-256\""
        );
    }
}
