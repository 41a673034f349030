// Error types for the CalmEase audio core
//
// This module defines custom error types for playback, session timing and
// persistence, each carrying a stable numeric code so UI layers can map
// failures to advisory messages without parsing strings.

mod audio;
mod session;
mod storage;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes, PlaybackErrorCode};
pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the coordinator, the timers and the stores.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Failure of a context-level operation spanning several components
///
/// Keeps the component error intact so its code and message stay stable.
#[derive(Debug, Clone, PartialEq)]
pub enum ReliefError {
    Audio(AudioError),
    Session(SessionError),
    Storage(StorageError),
}

impl ErrorCode for ReliefError {
    fn code(&self) -> i32 {
        match self {
            ReliefError::Audio(err) => err.code(),
            ReliefError::Session(err) => err.code(),
            ReliefError::Storage(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            ReliefError::Audio(err) => err.message(),
            ReliefError::Session(err) => err.message(),
            ReliefError::Storage(err) => err.message(),
        }
    }
}

impl std::fmt::Display for ReliefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReliefError::Audio(err) => std::fmt::Display::fmt(err, f),
            ReliefError::Session(err) => std::fmt::Display::fmt(err, f),
            ReliefError::Storage(err) => std::fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for ReliefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReliefError::Audio(err) => Some(err),
            ReliefError::Session(err) => Some(err),
            ReliefError::Storage(err) => Some(err),
        }
    }
}

impl From<AudioError> for ReliefError {
    fn from(err: AudioError) -> Self {
        ReliefError::Audio(err)
    }
}

impl From<SessionError> for ReliefError {
    fn from(err: SessionError) -> Self {
        ReliefError::Session(err)
    }
}

impl From<StorageError> for ReliefError {
    fn from(err: StorageError) -> Self {
        ReliefError::Storage(err)
    }
}
