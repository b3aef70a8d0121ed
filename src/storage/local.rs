//! # Local Filesystem Storage Provider

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use super::{AccessMode, RawHandle, StorageProvider};
use crate::error::{StorageError, StorageResult};

/// Largest file offset the OS accepts (`off_t` is signed)
const MAX_OBJECT_LEN: u64 = i64::MAX as u64;

#[derive(Debug)]
struct OpenFile {
    file: File,
    mode: AccessMode,
}

#[derive(Debug, Default)]
struct Handles {
    open: HashMap<u64, OpenFile>,
    next: u64,
}

/// Storage provider backed by a flat directory
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    handles: Mutex<Handles>,
}

impl LocalStorage {
    /// Use `root` as the object directory, creating it if needed
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            handles: Mutex::new(Handles::default()),
        })
    }

    /// Get the object directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn full_path(&self, name: &str) -> StorageResult<PathBuf> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn register(&self, file: File, mode: AccessMode) -> RawHandle {
        let mut handles = self.handles();
        handles.next += 1;
        let id = handles.next;
        handles.open.insert(id, OpenFile { file, mode });
        RawHandle(id)
    }
}

fn map_not_found(name: &str, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(e)
    }
}

impl StorageProvider for LocalStorage {
    fn create(&self, name: &str) -> StorageResult<RawHandle> {
        let path = self.full_path(name)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::AlreadyExists(name.to_string()),
                _ => StorageError::Io(e),
            })?;
        debug!(?path, "created object");
        Ok(self.register(file, AccessMode::ReadWrite))
    }

    fn open(&self, name: &str, mode: AccessMode) -> StorageResult<RawHandle> {
        let path = self.full_path(name)?;
        let file = OpenOptions::new()
            .read(true)
            .write(mode.is_writable())
            .open(&path)
            .map_err(|e| map_not_found(name, e))?;
        Ok(self.register(file, mode))
    }

    fn read(&self, handle: RawHandle, offset: u64, len: Option<usize>) -> StorageResult<Vec<u8>> {
        let mut handles = self.handles();
        let open = handles
            .open
            .get_mut(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        let total = open.file.metadata()?.len();
        if offset > total {
            return Err(StorageError::SeekPastEnd { offset, len: total });
        }
        open.file.seek(SeekFrom::Start(offset))?;

        let mut buf = Vec::new();
        match len {
            Some(len) => {
                (&mut open.file).take(len as u64).read_to_end(&mut buf)?;
            }
            None => {
                open.file.read_to_end(&mut buf)?;
            }
        }
        Ok(buf)
    }

    fn write(&self, handle: RawHandle, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut handles = self.handles();
        let open = handles
            .open
            .get_mut(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle.0))?;
        if !open.mode.is_writable() {
            return Err(StorageError::ReadOnlyHandle(handle.0));
        }

        if offset
            .checked_add(data.len() as u64)
            .map_or(true, |end| end > MAX_OBJECT_LEN)
        {
            return Err(StorageError::ObjectTooLarge {
                offset,
                len: data.len(),
                limit: MAX_OBJECT_LEN,
            });
        }

        // Seeking past the end and writing leaves a zero-filled gap.
        open.file.seek(SeekFrom::Start(offset))?;
        open.file.write_all(data)?;
        Ok(())
    }

    fn close(&self, handle: RawHandle) -> StorageResult<()> {
        let open = self
            .handles()
            .open
            .remove(&handle.0)
            .ok_or(StorageError::InvalidHandle(handle.0))?;
        if open.mode.is_writable() {
            open.file.sync_all()?;
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        let path = self.full_path(name)?;
        fs::remove_file(&path).map_err(|e| map_not_found(name, e))
    }

    fn list(&self) -> StorageResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => {
                    names.insert(name);
                }
                Err(raw) => warn!(name = ?raw, "skipping object with non UTF-8 name"),
            }
        }
        Ok(names)
    }
}
