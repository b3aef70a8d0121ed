//! Error types for the mediation layer and its storage providers

use thiserror::Error;

/// Result type for mediated file operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Result type for raw storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Rejections returned by the mediation layer
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("File already open: {name}")]
    AlreadyOpen { name: String },

    #[error("Cannot address version file directly: {name}")]
    ExplicitVersionName { name: String },

    #[error("File not found: {name}")]
    NotFound { name: String },

    #[error("Immutability violation: cannot write to {name} version {version}")]
    ImmutableWrite { name: String, version: u32 },

    #[error("File removal is not allowed: {name}")]
    DeleteNotAllowed { name: String },

    #[error("Storage fault: {0}")]
    Storage(#[from] StorageError),
}

/// Failures reported by a storage provider
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object name: {0:?}")]
    InvalidName(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(u64),

    #[error("Handle {0} is read-only")]
    ReadOnlyHandle(u64),

    #[error("Seek past end of object: offset {offset}, length {len}")]
    SeekPastEnd { offset: u64, len: u64 },

    #[error("Object too large: write of {len} bytes at offset {offset} exceeds {limit} bytes")]
    ObjectTooLarge { offset: u64, len: usize, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
