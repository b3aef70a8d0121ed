//! Version records and history entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checksum::Checksum;
use crate::naming;

/// Registry bookkeeping for one created version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Position in creation order (0 = base file)
    pub number: u32,
    /// When this version was created; unknown for versions recovered from storage
    pub created_at: Option<DateTime<Utc>>,
}

impl VersionRecord {
    /// Record a version created just now
    pub fn new(number: u32) -> Self {
        Self {
            number,
            created_at: Some(Utc::now()),
        }
    }

    /// Record a version found in storage during recovery
    pub fn recovered(number: u32) -> Self {
        Self {
            number,
            created_at: None,
        }
    }
}

/// A frozen version as reported by `VersionedFs::history`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version number
    pub number: u32,
    /// Storage name of this version
    pub physical_name: String,
    /// Content length in bytes
    pub size: u64,
    /// SHA256 of the content
    pub checksum: Checksum,
    /// Creation time, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl VersionInfo {
    /// Build a history entry from a registry record and the version's bytes
    pub fn new(logical: &str, record: &VersionRecord, content: &[u8]) -> Self {
        Self {
            number: record.number,
            physical_name: naming::physical_name(logical, record.number),
            size: content.len() as u64,
            checksum: Checksum::from_bytes(content),
            created_at: record.created_at,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} {} {} bytes {}", self.number, self.physical_name, self.size, self.checksum)
    }
}
