//! Version Registry
//!
//! In-memory bookkeeping of which logical files exist, how many versions each
//! has, and which are currently open. The registry never touches storage bytes.
//!
//! Every method takes the internal lock for its whole duration, so each call is
//! atomic with respect to the others. `mark_open` is a check-and-set: the
//! caller that wins it owns the logical file until `mark_closed`, which makes
//! the open flag the per-name critical section for multi-step operations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{MonitorError, Result};
use crate::version::VersionRecord;

/// State of one logical file
#[derive(Debug, Clone, Default)]
pub struct LogicalFile {
    /// Created versions in creation order
    pub versions: Vec<VersionRecord>,
    /// Whether a handle on any version is live
    pub is_open: bool,
}

impl LogicalFile {
    /// Number of versions created so far
    pub fn version_count(&self) -> u32 {
        self.versions.len() as u32
    }
}

/// Registry of logical files, owned by one mediation layer
#[derive(Debug, Default)]
pub struct VersionRegistry {
    files: Mutex<BTreeMap<String, LogicalFile>>,
}

impl VersionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<String, LogicalFile>> {
        // State is only mutated through single statements, so a poisoned
        // lock still guards a consistent map.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the logical file has a live handle
    pub fn is_open(&self, name: &str) -> bool {
        self.files().get(name).map(|f| f.is_open).unwrap_or(false)
    }

    /// Record that a handle now exists.
    ///
    /// Fails with `AlreadyOpen` if another handle holds the file.
    pub fn mark_open(&self, name: &str) -> Result<()> {
        let mut files = self.files();
        let file = files.entry(name.to_string()).or_default();
        if file.is_open {
            return Err(MonitorError::AlreadyOpen {
                name: name.to_string(),
            });
        }
        file.is_open = true;
        Ok(())
    }

    /// Clear the open flag.
    ///
    /// A name that never got a version is forgotten entirely.
    pub fn mark_closed(&self, name: &str) {
        let mut files = self.files();
        let forget = match files.get_mut(name) {
            Some(file) => {
                file.is_open = false;
                file.versions.is_empty()
            }
            None => false,
        };
        if forget {
            files.remove(name);
        }
    }

    /// Number of versions created so far; 0 if the file was never created
    pub fn version_count(&self, name: &str) -> u32 {
        self.files().get(name).map(LogicalFile::version_count).unwrap_or(0)
    }

    /// Number to assign to the version about to be created
    pub fn next_version_number(&self, name: &str) -> u32 {
        self.version_count(name)
    }

    /// Append a new version and return its number
    pub fn record_new_version(&self, name: &str) -> u32 {
        let mut files = self.files();
        let file = files.entry(name.to_string()).or_default();
        let number = file.version_count();
        file.versions.push(VersionRecord::new(number));
        number
    }

    /// Seed a logical file with `count` versions found in storage.
    ///
    /// Existing records for the name are replaced.
    pub fn restore(&self, name: &str, count: u32) {
        if count == 0 {
            return;
        }
        let versions = (0..count).map(VersionRecord::recovered).collect();
        self.files().insert(
            name.to_string(),
            LogicalFile {
                versions,
                is_open: false,
            },
        );
    }

    /// Version records of a logical file, oldest first
    pub fn versions(&self, name: &str) -> Vec<VersionRecord> {
        self.files()
            .get(name)
            .map(|f| f.versions.clone())
            .unwrap_or_default()
    }

    /// Logical names with at least one version, sorted
    pub fn names(&self) -> Vec<String> {
        self.files()
            .iter()
            .filter(|(_, f)| !f.versions.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_file() {
        let registry = VersionRegistry::new();
        assert!(!registry.is_open("a"));
        assert_eq!(registry.version_count("a"), 0);
        assert_eq!(registry.next_version_number("a"), 0);
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_mark_open_is_exclusive() {
        let registry = VersionRegistry::new();
        registry.mark_open("a").unwrap();
        assert!(registry.is_open("a"));
        assert!(matches!(
            registry.mark_open("a"),
            Err(MonitorError::AlreadyOpen { .. })
        ));

        registry.record_new_version("a");
        registry.mark_closed("a");
        assert!(!registry.is_open("a"));
        registry.mark_open("a").unwrap();
    }

    #[test]
    fn test_version_numbering() {
        let registry = VersionRegistry::new();
        assert_eq!(registry.record_new_version("a"), 0);
        assert_eq!(registry.next_version_number("a"), 1);
        assert_eq!(registry.record_new_version("a"), 1);
        assert_eq!(registry.record_new_version("a"), 2);
        assert_eq!(registry.version_count("a"), 3);

        let numbers: Vec<u32> = registry.versions("a").iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn test_close_without_version_forgets_name() {
        let registry = VersionRegistry::new();
        registry.mark_open("ghost").unwrap();
        registry.mark_closed("ghost");
        assert!(registry.names().is_empty());
        assert_eq!(registry.version_count("ghost"), 0);
    }

    #[test]
    fn test_names_skip_pending_files() {
        let registry = VersionRegistry::new();
        registry.mark_open("pending").unwrap();
        registry.record_new_version("b");
        registry.record_new_version("a");
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_restore() {
        let registry = VersionRegistry::new();
        registry.restore("a", 3);
        registry.restore("empty", 0);
        assert_eq!(registry.version_count("a"), 3);
        assert!(registry.versions("a").iter().all(|v| v.created_at.is_none()));
        assert_eq!(registry.names(), vec!["a".to_string()]);
    }
}
