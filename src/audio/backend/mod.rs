//! Backend abstractions for the playback channels.
//!
//! A `MediaBackend` is the platform playback engine behind one channel: it
//! holds at most one loaded source and reports position from its own clock.
//! Channels own the observable state; backends only do the I/O.

use futures::future::BoxFuture;

use crate::error::AudioError;

/// Metadata reported once a source has been loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
}

/// Trait implemented by platform playback engines.
///
/// `play` is the only operation that may be refused asynchronously (autoplay
/// policy, decode failure). Implementations decide synchronously when `play`
/// is called and return the outcome through the future, so a `pause` issued
/// while the caller awaits still wins.
pub trait MediaBackend: Send + Sync {
    /// Replace the loaded source. Position resets to zero.
    fn load(&self, source: &str) -> Result<MediaInfo, AudioError>;

    fn play(&self) -> BoxFuture<'static, Result<(), AudioError>>;

    fn pause(&self);

    /// Seek to an absolute position in seconds; callers clamp beforehand.
    fn seek(&self, seconds: f64);

    /// Current playback position in seconds.
    fn position(&self) -> f64;

    /// True once a non-looping source has played to its end.
    fn has_ended(&self) -> bool;

    fn set_volume(&self, volume: f32);

    fn set_loop(&self, looping: bool);

    fn set_playback_rate(&self, rate: f32);
}

mod simulated;
pub use simulated::{AutoplayPolicy, SimulatedBackend};

pub mod wav;

#[cfg(not(target_os = "android"))]
mod device;
#[cfg(not(target_os = "android"))]
pub use device::CpalBackend;
