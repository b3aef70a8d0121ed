//! Storage providers
//!
//! Raw create/open/read/write/close/remove/list primitives over named byte
//! objects. Providers know nothing about versions; the mediation layer maps
//! logical files onto physical names before calling them.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::{MemoryStorage, DEFAULT_OBJECT_LIMIT};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Access mode of an open handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Opaque handle issued by a storage provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend trait for physical object storage
pub trait StorageProvider: Send + Sync + fmt::Debug {
    /// Create a new object and open it read-write.
    ///
    /// Fails with `AlreadyExists` if the name is taken; stored objects are
    /// never truncated.
    fn create(&self, name: &str) -> StorageResult<RawHandle>;

    /// Open an existing object
    fn open(&self, name: &str, mode: AccessMode) -> StorageResult<RawHandle>;

    /// Read `len` bytes at `offset`, or everything from `offset` when `len` is `None`
    fn read(&self, handle: RawHandle, offset: u64, len: Option<usize>) -> StorageResult<Vec<u8>>;

    /// Write `data` at `offset`, zero-filling any gap past the current end
    fn write(&self, handle: RawHandle, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Flush and release a handle
    fn close(&self, handle: RawHandle) -> StorageResult<()>;

    /// Remove an object
    fn remove(&self, name: &str) -> StorageResult<()>;

    /// Names of all stored objects
    fn list(&self) -> StorageResult<BTreeSet<String>>;
}

/// Lets a backend chosen at runtime sit behind the mediation layer
impl StorageProvider for Box<dyn StorageProvider> {
    fn create(&self, name: &str) -> StorageResult<RawHandle> {
        (**self).create(name)
    }

    fn open(&self, name: &str, mode: AccessMode) -> StorageResult<RawHandle> {
        (**self).open(name, mode)
    }

    fn read(&self, handle: RawHandle, offset: u64, len: Option<usize>) -> StorageResult<Vec<u8>> {
        (**self).read(handle, offset, len)
    }

    fn write(&self, handle: RawHandle, offset: u64, data: &[u8]) -> StorageResult<()> {
        (**self).write(handle, offset, data)
    }

    fn close(&self, handle: RawHandle) -> StorageResult<()> {
        (**self).close(handle)
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        (**self).remove(name)
    }

    fn list(&self) -> StorageResult<BTreeSet<String>> {
        (**self).list()
    }
}

/// Read an entire object through a temporary read-only handle
pub(crate) fn read_object<S: StorageProvider + ?Sized>(storage: &S, name: &str) -> StorageResult<Vec<u8>> {
    let handle = storage.open(name, AccessMode::ReadOnly)?;
    let content = storage.read(handle, 0, None);
    let closed = storage.close(handle);
    let content = content?;
    closed?;
    Ok(content)
}
