use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hasher::ChecksumHasher;

/// Hex-encoded content digest, stored lowercase.
///
/// Parsing accepts any non-empty, even-length hex string so manifests
/// written with a shorter legacy digest still load; they simply never
/// verify against a SHA-256 computed locally.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Checksum of an in-memory byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = ChecksumHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Parse a hex digest.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        if value.is_empty() {
            return Err(CryptoError::InvalidChecksum {
                value: value.to_string(),
                reason: "checksum must not be empty".into(),
            });
        }
        hex::decode(value).map_err(|e| CryptoError::InvalidChecksum {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters used in compact listings.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(7)]
    }
}

impl TryFrom<String> for Checksum {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Checksum> for String {
    fn from(sum: Checksum) -> Self {
        sum.0
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.short())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
