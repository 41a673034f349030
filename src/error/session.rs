// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 2001-2004
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Breathing pattern has a non-positive duration or zero cycles
    pub const INVALID_PATTERN: i32 = 2001;

    /// Fade configuration has zero steps or a zero duration
    pub const INVALID_FADE: i32 = 2002;

    /// Engine/timer state lock was poisoned
    pub const STATE_POISONED: i32 = 2003;

    /// A timer was started outside of a tokio runtime
    pub const NO_RUNTIME: i32 = 2004;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=Session, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised synchronously by the breathing engine and session timer
///
/// All of these are returned before any state mutation happens, so a
/// rejected start leaves the component exactly as it was.
///
/// Error code range: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    InvalidPattern { reason: String },

    InvalidFade { reason: String },

    StatePoisoned { component: String },

    NoRuntime,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidPattern { .. } => SessionErrorCodes::INVALID_PATTERN,
            SessionError::InvalidFade { .. } => SessionErrorCodes::INVALID_FADE,
            SessionError::StatePoisoned { .. } => SessionErrorCodes::STATE_POISONED,
            SessionError::NoRuntime => SessionErrorCodes::NO_RUNTIME,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidPattern { reason } => {
                format!("Invalid breathing pattern: {}", reason)
            }
            SessionError::InvalidFade { reason } => {
                format!("Invalid fade configuration: {}", reason)
            }
            SessionError::StatePoisoned { component } => {
                format!("State lock poisoned on {}", component)
            }
            SessionError::NoRuntime => {
                "No tokio runtime available to schedule timers".to_string()
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}
