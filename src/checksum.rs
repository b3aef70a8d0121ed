//! Checksum utilities for version integrity verification

use sha2::{Sha256, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of a version's content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &[u8]) -> bool {
        Self::from_bytes(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        assert_eq!(Checksum::from_bytes(b"hello"), Checksum::from_bytes(b"hello"));
        assert_ne!(Checksum::from_bytes(b"hello"), Checksum::from_bytes(b"hello!"));
    }

    #[test]
    fn test_known_digest() {
        let checksum = Checksum::from_bytes(b"");
        assert_eq!(
            checksum.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_verification() {
        let checksum = Checksum::from_bytes(b"HelloWorld");
        assert!(checksum.verify(b"HelloWorld"));
        assert!(!checksum.verify(b"Hack"));
    }
}
