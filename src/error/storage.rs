// Storage error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 3001-3004
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Backing store cannot be reached or written
    pub const UNAVAILABLE: i32 = 3001;

    /// Persisted data could not be parsed
    pub const CORRUPT: i32 = 3002;

    /// Requested record does not exist
    pub const NOT_FOUND: i32 = 3003;

    /// Filesystem I/O failure
    pub const IO: i32 = 3004;
}

/// Log a storage error with structured context
///
/// Storage failures degrade to defaults in most call sites, so they are
/// logged at warn level rather than error.
pub fn log_storage_error(err: &StorageError, context: &str) {
    warn!(
        "Storage error in {}: code={}, component=Storage, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Preference store and track catalog errors
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    Unavailable { reason: String },

    Corrupt { key: String, reason: String },

    NotFound { id: u64 },

    Io { details: String },
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Unavailable { .. } => StorageErrorCodes::UNAVAILABLE,
            StorageError::Corrupt { .. } => StorageErrorCodes::CORRUPT,
            StorageError::NotFound { .. } => StorageErrorCodes::NOT_FOUND,
            StorageError::Io { .. } => StorageErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Unavailable { reason } => format!("Storage unavailable: {}", reason),
            StorageError::Corrupt { key, reason } => {
                format!("Corrupt data under {}: {}", key, reason)
            }
            StorageError::NotFound { id } => format!("Track {} not found", id),
            StorageError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            details: err.to_string(),
        }
    }
}
