//! Mediation Layer
//!
//! Turns a mutable file API into a versioned, append-only one. Every
//! `open(name, true)` on an existing file spawns a new version seeded with the
//! previous version's bytes, closed versions can never be written again, nothing
//! can be deleted, and version files stay out of listings.
//!
//! ```text
//! NONEXISTENT --open(create)--> OPEN(v0) --close--> CLOSED(v0)
//!     CLOSED(vK) --open(create)--> OPEN(vK+1) --close--> CLOSED(vK+1) ...
//! ```
//!
//! At most one handle exists per logical file at any time, whichever version
//! it targets. Read-only opens are subject to the same rule.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::error::{MonitorError, Result, StorageError};
use crate::naming;
use crate::registry::VersionRegistry;
use crate::storage::{self, AccessMode, RawHandle, StorageProvider};
use crate::version::VersionInfo;

/// A session bound to one version of one logical file.
///
/// Handles are consumed by `VersionedFs::close`, so a closed session cannot be
/// written through again.
#[derive(Debug)]
pub struct FileHandle {
    name: String,
    version: u32,
    mode: AccessMode,
    raw: RawHandle,
}

impl FileHandle {
    /// Logical name this handle was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version the handle is bound to
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Access mode of the handle
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Storage name of the bound version
    pub fn physical_name(&self) -> String {
        naming::physical_name(&self.name, self.version)
    }
}

/// Versioned, append-only view over a storage provider
#[derive(Debug)]
pub struct VersionedFs<S: StorageProvider> {
    registry: VersionRegistry,
    storage: S,
}

impl<S: StorageProvider> VersionedFs<S> {
    /// Mediate an empty storage provider
    pub fn new(storage: S) -> Self {
        Self::with_registry(storage, VersionRegistry::new())
    }

    /// Mediate `storage` using an existing registry
    pub fn with_registry(storage: S, registry: VersionRegistry) -> Self {
        Self { registry, storage }
    }

    /// Rebuild the registry from whatever `storage` already holds.
    ///
    /// Every canonical object `name` or `name.v<k>` recovers the logical file
    /// `name`, whose version count becomes one past the highest `k` found.
    /// Versions missing below that (gaps, or a missing base) stay missing and
    /// surface as `NotFound` from storage when read, so the next created
    /// version never lands on a stored object. Non-canonical objects (`.v0`,
    /// `.v01`) are left in storage and hidden.
    pub fn recover(storage: S) -> Result<Self> {
        let mut highest: BTreeMap<String, u32> = BTreeMap::new();
        let mut skipped = 0usize;

        for object in storage.list()? {
            match naming::parse_physical(&object) {
                Some((logical, version)) if !naming::is_version_name(&logical) => {
                    let top = highest.entry(logical).or_insert(version);
                    *top = (*top).max(version);
                }
                _ => {
                    skipped += 1;
                    warn!(object = %object, "ignoring non-canonical version object");
                }
            }
        }

        let registry = VersionRegistry::new();
        for (name, top) in &highest {
            match top.checked_add(1) {
                Some(count) => registry.restore(name, count),
                None => {
                    skipped += 1;
                    warn!(name = %name, "version numbers exhausted, file not recovered");
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "some stored objects were not recovered");
        }
        info!(files = registry.names().len(), "recovered registry from storage");

        Ok(Self::with_registry(storage, registry))
    }

    /// The registry backing this layer
    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// The underlying storage provider
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Open a logical file.
    ///
    /// With `create`, a new file starts at version 0 and an existing file gets a
    /// new version holding a copy of the latest one; the handle is read-write.
    /// Without `create`, the latest version is opened read-only.
    pub fn open(&self, name: &str, create: bool) -> Result<FileHandle> {
        if naming::is_version_name(name) {
            return Err(MonitorError::ExplicitVersionName {
                name: name.to_string(),
            });
        }

        self.registry.mark_open(name)?;
        let result = self.open_marked(name, create);
        if result.is_err() {
            self.registry.mark_closed(name);
        }
        result
    }

    fn open_marked(&self, name: &str, create: bool) -> Result<FileHandle> {
        let count = self.registry.version_count(name);

        if !create {
            if count == 0 {
                return Err(MonitorError::NotFound {
                    name: name.to_string(),
                });
            }
            let version = count - 1;
            let raw = self
                .storage
                .open(&naming::physical_name(name, version), AccessMode::ReadOnly)?;
            debug!(name, version, "opened read-only");
            return Ok(self.handle(name, version, AccessMode::ReadOnly, raw));
        }

        let version = self.registry.next_version_number(name);
        let seed = if version > 0 {
            Some(storage::read_object(
                &self.storage,
                &naming::physical_name(name, version - 1),
            )?)
        } else {
            None
        };

        let physical = naming::physical_name(name, version);
        let raw = self.storage.create(&physical)?;
        if let Some(content) = seed {
            if let Err(e) = self.storage.write(raw, 0, &content) {
                // Never recorded as a version, so nothing references it.
                let _ = self.storage.close(raw);
                if let Err(cleanup) = self.storage.remove(&physical) {
                    warn!(object = %physical, error = %cleanup, "failed to discard partial version");
                }
                return Err(e.into());
            }
        }

        self.registry.record_new_version(name);
        info!(name, version, "created version");
        Ok(self.handle(name, version, AccessMode::ReadWrite, raw))
    }

    /// Open a specific version read-only.
    ///
    /// This is the administrative path to historical versions; handles it
    /// returns can never write.
    pub fn open_version(&self, name: &str, version: u32) -> Result<FileHandle> {
        if naming::is_version_name(name) {
            return Err(MonitorError::ExplicitVersionName {
                name: name.to_string(),
            });
        }

        self.registry.mark_open(name)?;
        let result = if version < self.registry.version_count(name) {
            self.storage
                .open(&naming::physical_name(name, version), AccessMode::ReadOnly)
                .map(|raw| self.handle(name, version, AccessMode::ReadOnly, raw))
                .map_err(MonitorError::from)
        } else {
            Err(MonitorError::NotFound {
                name: naming::physical_name(name, version),
            })
        };
        if result.is_err() {
            self.registry.mark_closed(name);
        }
        result
    }

    fn handle(&self, name: &str, version: u32, mode: AccessMode, raw: RawHandle) -> FileHandle {
        FileHandle {
            name: name.to_string(),
            version,
            mode,
            raw,
        }
    }

    /// Read `len` bytes at `offset`, or to the end when `len` is `None`
    pub fn read(&self, handle: &FileHandle, offset: u64, len: Option<usize>) -> Result<Vec<u8>> {
        Ok(self.storage.read(handle.raw, offset, len)?)
    }

    /// Write through the immutability gate.
    ///
    /// Only a read-write handle on the latest version of a file that is still
    /// open may write.
    pub fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> Result<()> {
        let latest = self.registry.version_count(&handle.name).checked_sub(1);
        let mutable = handle.mode.is_writable()
            && self.registry.is_open(&handle.name)
            && latest == Some(handle.version);
        if !mutable {
            return Err(MonitorError::ImmutableWrite {
                name: handle.name.clone(),
                version: handle.version,
            });
        }

        self.storage.write(handle.raw, offset, data)?;
        Ok(())
    }

    /// Close a handle, freezing the version it was bound to.
    ///
    /// The logical file is released even when the provider fails to close.
    pub fn close(&self, handle: FileHandle) -> Result<()> {
        let closed = self.storage.close(handle.raw);
        self.registry.mark_closed(&handle.name);
        debug!(name = %handle.name, version = handle.version, "closed");
        closed?;
        Ok(())
    }

    /// Deletion is never permitted
    pub fn delete(&self, name: &str) -> Result<()> {
        Err(MonitorError::DeleteNotAllowed {
            name: name.to_string(),
        })
    }

    /// Logical names of every created file; version objects are never listed
    pub fn list_files(&self) -> BTreeSet<String> {
        self.registry
            .names()
            .into_iter()
            .filter(|n| !naming::is_version_name(n))
            .collect()
    }

    /// Describe every stored version of a closed logical file.
    ///
    /// Versions whose object is missing from storage are left out.
    pub fn history(&self, name: &str) -> Result<Vec<VersionInfo>> {
        if naming::is_version_name(name) {
            return Err(MonitorError::ExplicitVersionName {
                name: name.to_string(),
            });
        }

        self.registry.mark_open(name)?;
        let result = self.collect_history(name);
        self.registry.mark_closed(name);
        result
    }

    fn collect_history(&self, name: &str) -> Result<Vec<VersionInfo>> {
        let records = self.registry.versions(name);
        if records.is_empty() {
            return Err(MonitorError::NotFound {
                name: name.to_string(),
            });
        }

        let mut history = Vec::with_capacity(records.len());
        for record in &records {
            let physical = naming::physical_name(name, record.number);
            match storage::read_object(&self.storage, &physical) {
                Ok(content) => history.push(VersionInfo::new(name, record, &content)),
                Err(StorageError::NotFound(_)) => {
                    warn!(object = %physical, "version object missing from storage");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(history)
    }

    /// Compare current version checksums against a previously taken history.
    ///
    /// Returns the numbers of versions whose content changed or disappeared.
    /// Versions created after `expected` was taken are not reported.
    pub fn verify(&self, name: &str, expected: &[VersionInfo]) -> Result<Vec<u32>> {
        let current = self.history(name)?;
        let tampered = expected
            .iter()
            .filter(|old| {
                current
                    .iter()
                    .find(|info| info.number == old.number)
                    .map(|info| info.checksum != old.checksum)
                    .unwrap_or(true)
            })
            .map(|old| old.number)
            .collect();
        Ok(tampered)
    }

    /// Checksum of a single version, for callers holding no history
    pub fn checksum(&self, name: &str, version: u32) -> Result<Checksum> {
        let handle = self.open_version(name, version)?;
        let content = self.read(&handle, 0, None);
        self.close(handle)?;
        Ok(Checksum::from_bytes(&content?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn fs() -> VersionedFs<MemoryStorage> {
        VersionedFs::new(MemoryStorage::new())
    }

    fn write_version(fs: &VersionedFs<MemoryStorage>, name: &str, offset: u64, data: &[u8]) {
        let h = fs.open(name, true).unwrap();
        fs.write(&h, offset, data).unwrap();
        fs.close(h).unwrap();
    }

    #[test]
    fn test_create_then_reopen_copies_content() {
        let fs = fs();
        write_version(&fs, "a", 0, b"hello");

        let h = fs.open("a", true).unwrap();
        assert_eq!(h.version(), 1);
        assert_eq!(h.physical_name(), "a.v1");
        assert_eq!(fs.read(&h, 0, None).unwrap(), b"hello");
        fs.write(&h, 5, b"!").unwrap();
        fs.close(h).unwrap();

        assert_eq!(fs.storage().contents("a.v1").unwrap(), b"hello!");
        assert_eq!(fs.storage().contents("a").unwrap(), b"hello");
    }

    #[test]
    fn test_open_missing() {
        let fs = fs();
        assert!(matches!(fs.open("b", false), Err(MonitorError::NotFound { .. })));
        assert!(!fs.registry().is_open("b"));
        assert!(fs.list_files().is_empty());

        let h = fs.open("b", true).unwrap();
        fs.close(h).unwrap();

        let h = fs.open("b", false).unwrap();
        assert_eq!(h.version(), 0);
        assert_eq!(h.mode(), AccessMode::ReadOnly);
        fs.close(h).unwrap();
    }

    #[test]
    fn test_already_open() {
        let fs = fs();
        let h = fs.open("c", true).unwrap();
        assert!(matches!(fs.open("c", true), Err(MonitorError::AlreadyOpen { .. })));
        assert!(matches!(fs.open("c", false), Err(MonitorError::AlreadyOpen { .. })));
        assert!(matches!(fs.open_version("c", 0), Err(MonitorError::AlreadyOpen { .. })));
        assert!(matches!(fs.history("c"), Err(MonitorError::AlreadyOpen { .. })));
        fs.close(h).unwrap();
        assert_eq!(fs.registry().version_count("c"), 1);
    }

    #[test]
    fn test_explicit_version_names() {
        let fs = fs();
        write_version(&fs, "d", 0, b"x");
        write_version(&fs, "d", 0, b"y");
        for create in [true, false] {
            assert!(matches!(
                fs.open("d.v1", create),
                Err(MonitorError::ExplicitVersionName { .. })
            ));
        }
        assert!(matches!(
            fs.open_version("d.v1", 0),
            Err(MonitorError::ExplicitVersionName { .. })
        ));
        assert!(!fs.registry().is_open("d.v1"));
    }

    #[test]
    fn test_read_only_handle_cannot_write() {
        let fs = fs();
        write_version(&fs, "e", 0, b"Original");
        let h = fs.open("e", false).unwrap();
        assert!(matches!(
            fs.write(&h, 0, b"Hack"),
            Err(MonitorError::ImmutableWrite { version: 0, .. })
        ));
        fs.close(h).unwrap();
        assert_eq!(fs.storage().contents("e").unwrap(), b"Original");
    }

    #[test]
    fn test_old_version_is_read_only() {
        let fs = fs();
        write_version(&fs, "f", 0, b"V1");
        write_version(&fs, "f", 0, b"V2");

        let h = fs.open_version("f", 0).unwrap();
        assert_eq!(fs.read(&h, 0, None).unwrap(), b"V1");
        assert!(matches!(fs.write(&h, 0, b"x"), Err(MonitorError::ImmutableWrite { .. })));
        fs.close(h).unwrap();

        assert!(matches!(fs.open_version("f", 2), Err(MonitorError::NotFound { .. })));
        assert!(!fs.registry().is_open("f"));
    }

    #[test]
    fn test_delete_always_rejected() {
        let fs = fs();
        assert!(matches!(fs.delete("g"), Err(MonitorError::DeleteNotAllowed { .. })));
        let h = fs.open("g", true).unwrap();
        assert!(matches!(fs.delete("g"), Err(MonitorError::DeleteNotAllowed { .. })));
        fs.close(h).unwrap();
        assert!(matches!(fs.delete("g"), Err(MonitorError::DeleteNotAllowed { .. })));
        assert!(matches!(fs.delete("g.v1"), Err(MonitorError::DeleteNotAllowed { .. })));
        assert!(fs.storage().contents("g").is_some());
    }

    #[test]
    fn test_list_hides_versions() {
        let fs = fs();
        for _ in 0..3 {
            write_version(&fs, "h", 0, b"x");
        }
        write_version(&fs, "file.version", 0, b"NotAVersion");

        let listed: Vec<String> = fs.list_files().into_iter().collect();
        assert_eq!(listed, vec!["file.version".to_string(), "h".to_string()]);
        assert!(fs.storage().contents("h.v2").is_some());
    }

    #[test]
    fn test_history_and_verify() {
        let fs = fs();
        write_version(&fs, "i", 0, b"one");
        write_version(&fs, "i", 3, b"two");

        let history = fs.history("i").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].physical_name, "i");
        assert_eq!(history[1].size, 6);
        assert!(history[1].checksum.verify(b"onetwo"));
        assert_eq!(fs.checksum("i", 1).unwrap(), history[1].checksum);
        assert!(fs.verify("i", &history).unwrap().is_empty());

        fs.storage().insert("i", b"forged");
        assert_eq!(fs.verify("i", &history).unwrap(), vec![0]);

        fs.storage().remove("i.v1").unwrap();
        let current = fs.history("i").unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(fs.verify("i", &history).unwrap(), vec![0, 1]);

        assert!(matches!(fs.history("missing"), Err(MonitorError::NotFound { .. })));
        assert!(fs.list_files().contains("i"));
        assert!(!fs.list_files().contains("missing"));
    }
}
