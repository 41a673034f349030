// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for numeric playback error codes.
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Platform rejected playback without a prior user gesture
    pub const PLAYBACK_BLOCKED: i32 = 1001;

    /// Resource missing or undecodable
    pub const LOAD_FAILED: i32 = 1002;

    /// Play requested with no source loaded
    pub const NO_SOURCE: i32 = 1003;

    /// Playback rate must be finite and positive
    pub const INVALID_PLAYBACK_RATE: i32 = 1004;

    /// No output device or the output stream could not be opened
    pub const DEVICE_UNAVAILABLE: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;
}

/// Channel-level error descriptor surfaced through `last_error`.
///
/// Only the two user-facing failure kinds exist here; the remaining
/// `AudioError` variants collapse into `LoadFailed` from the listener's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackErrorCode {
    AutoplayBlocked,
    LoadFailed,
}

impl PlaybackErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackErrorCode::AutoplayBlocked => "AUTOPLAY_BLOCKED",
            PlaybackErrorCode::LoadFailed => "LOAD_FAILED",
        }
    }

    /// Static advisory shown inline until the user retries.
    pub fn advisory(&self) -> &'static str {
        match self {
            PlaybackErrorCode::AutoplayBlocked => {
                "Playback was prevented by the platform. Interact with the page first."
            }
            PlaybackErrorCode::LoadFailed => {
                "Audio failed to load. Please add media files to the sounds folder."
            }
        }
    }
}

impl fmt::Display for PlaybackErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioChannel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover channel playback, source loading and output device
/// access.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Platform autoplay policy rejected the play request
    PlaybackBlocked { reason: String },

    /// Source could not be found or decoded
    LoadFailed { source: String, reason: String },

    /// Play requested before any source was loaded
    NoSource,

    /// Playback rate is zero, negative or not finite
    InvalidPlaybackRate { rate: f32 },

    /// Output device missing or stream failed to open
    DeviceUnavailable { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl AudioError {
    /// Descriptor stored in the channel's `last_error`.
    pub fn playback_code(&self) -> PlaybackErrorCode {
        match self {
            AudioError::PlaybackBlocked { .. } => PlaybackErrorCode::AutoplayBlocked,
            _ => PlaybackErrorCode::LoadFailed,
        }
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::PlaybackBlocked { .. } => AudioErrorCodes::PLAYBACK_BLOCKED,
            AudioError::LoadFailed { .. } => AudioErrorCodes::LOAD_FAILED,
            AudioError::NoSource => AudioErrorCodes::NO_SOURCE,
            AudioError::InvalidPlaybackRate { .. } => AudioErrorCodes::INVALID_PLAYBACK_RATE,
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::PlaybackBlocked { reason } => {
                format!("Playback blocked: {}", reason)
            }
            AudioError::LoadFailed { source, reason } => {
                format!("Failed to load {}: {}", source, reason)
            }
            AudioError::NoSource => "No audio source loaded".to_string(),
            AudioError::InvalidPlaybackRate { rate } => {
                format!("Playback rate must be a positive number (got {})", rate)
            }
            AudioError::DeviceUnavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
