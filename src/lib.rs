//! verfs
//!
//! A versioned, append-only file mediation layer. Callers see an ordinary
//! open/read/write/close/delete/list API; underneath, every reopen-for-write
//! creates a new immutable version, closed versions can never be altered or
//! deleted, and version objects are hidden from listings.
//!
//! ## Features
//!
//! - **Automatic Versioning**: Reopening a file for write copies its latest version
//! - **Immutability**: Only the open, latest, read-write version accepts writes
//! - **No Deletion**: Removal is rejected unconditionally
//! - **Hidden History**: Listings show logical names only
//! - **Tamper Evidence**: SHA256 checksums over every version
//!
//! ## Storage Layout
//!
//! ```text
//! root/
//! ├── notes          # version 0
//! ├── notes.v1       # version 1
//! ├── notes.v2       # version 2 (latest)
//! └── todo
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod monitor;
pub mod naming;
pub mod registry;
pub mod storage;
pub mod version;

pub use checksum::Checksum;
pub use config::{StorageBackend, VerfsConfig};
pub use error::{MonitorError, Result, StorageError, StorageResult};
pub use monitor::{FileHandle, VersionedFs};
pub use registry::VersionRegistry;
pub use storage::{AccessMode, LocalStorage, MemoryStorage, RawHandle, StorageProvider};
pub use version::{VersionInfo, VersionRecord};
