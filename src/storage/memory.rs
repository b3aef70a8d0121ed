//! # In-Memory Storage Provider

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{AccessMode, RawHandle, StorageProvider};
use crate::error::{StorageError, StorageResult};

#[derive(Debug)]
struct OpenObject {
    name: String,
    mode: AccessMode,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    handles: HashMap<u64, OpenObject>,
    next_handle: u64,
}

impl State {
    fn issue(&mut self, name: &str, mode: AccessMode) -> RawHandle {
        self.next_handle += 1;
        let id = self.next_handle;
        self.handles.insert(
            id,
            OpenObject {
                name: name.to_string(),
                mode,
            },
        );
        RawHandle(id)
    }

    fn object(&self, handle: RawHandle) -> StorageResult<(&OpenObject, &Vec<u8>)> {
        let open = self
            .handles
            .get(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle.0))?;
        let bytes = self
            .objects
            .get(&open.name)
            .ok_or_else(|| StorageError::NotFound(open.name.clone()))?;
        Ok((open, bytes))
    }
}

/// Largest object a `MemoryStorage` holds unless configured otherwise (1 GiB)
pub const DEFAULT_OBJECT_LIMIT: u64 = 1 << 30;

/// Storage provider that keeps every object in memory
#[derive(Debug)]
pub struct MemoryStorage {
    state: Mutex<State>,
    limit: u64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_limit(DEFAULT_OBJECT_LIMIT)
    }
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose objects may not grow past `limit` bytes
    pub fn with_limit(limit: u64) -> Self {
        Self {
            state: Mutex::new(State::default()),
            limit,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raw bytes of an object, bypassing handles
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state().objects.get(name).cloned()
    }

    /// Overwrite an object's bytes directly, bypassing handles
    pub fn insert(&self, name: &str, data: &[u8]) {
        self.state().objects.insert(name.to_string(), data.to_vec());
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.state().handles.len()
    }
}

impl StorageProvider for MemoryStorage {
    fn create(&self, name: &str) -> StorageResult<RawHandle> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        let mut state = self.state();
        if state.objects.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        state.objects.insert(name.to_string(), Vec::new());
        Ok(state.issue(name, AccessMode::ReadWrite))
    }

    fn open(&self, name: &str, mode: AccessMode) -> StorageResult<RawHandle> {
        let mut state = self.state();
        if !state.objects.contains_key(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(state.issue(name, mode))
    }

    fn read(&self, handle: RawHandle, offset: u64, len: Option<usize>) -> StorageResult<Vec<u8>> {
        let state = self.state();
        let (_, bytes) = state.object(handle)?;
        let total = bytes.len() as u64;
        if offset > total {
            return Err(StorageError::SeekPastEnd { offset, len: total });
        }
        let start = offset as usize;
        let end = match len {
            Some(len) => start.saturating_add(len).min(bytes.len()),
            None => bytes.len(),
        };
        Ok(bytes[start..end].to_vec())
    }

    fn write(&self, handle: RawHandle, offset: u64, data: &[u8]) -> StorageResult<()> {
        let too_large = || StorageError::ObjectTooLarge {
            offset,
            len: data.len(),
            limit: self.limit,
        };
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= self.limit)
            .ok_or_else(too_large)?;
        let start = usize::try_from(offset).map_err(|_| too_large())?;
        let end = usize::try_from(end).map_err(|_| too_large())?;

        let mut state = self.state();
        let (open, _) = state.object(handle)?;
        if !open.mode.is_writable() {
            return Err(StorageError::ReadOnlyHandle(handle.0));
        }
        let name = open.name.clone();
        let bytes = state
            .objects
            .get_mut(&name)
            .ok_or(StorageError::NotFound(name))?;

        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn close(&self, handle: RawHandle) -> StorageResult<()> {
        self.state()
            .handles
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(StorageError::InvalidHandle(handle.0))
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        self.state()
            .objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn list(&self) -> StorageResult<BTreeSet<String>> {
        Ok(self.state().objects.keys().cloned().collect())
    }
}
