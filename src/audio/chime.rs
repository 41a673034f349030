//! Completion chime - short sine tone played when a session ends
//!
//! The chime is a 660 Hz sine with a fast exponential attack and a slow
//! exponential decay. Generation is pure and deterministic; playback goes
//! through a [`ChimePlayer`] so headless builds and tests can substitute a
//! silent implementation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Chime pitch in Hz
pub const CHIME_FREQUENCY_HZ: f32 = 660.0;

/// Total rendered length in seconds
pub const CHIME_DURATION_SECS: f32 = 0.85;

const ATTACK_SECS: f32 = 0.02;
const DECAY_END_SECS: f32 = 0.8;
const FLOOR_GAIN: f32 = 0.0001;
const PEAK_GAIN: f32 = 0.2;

/// Gain envelope at time `t` seconds.
///
/// Exponential ramp from the floor to the peak over the attack, then back to
/// the floor by `DECAY_END_SECS`, holding the floor afterwards.
pub fn chime_envelope(t: f32) -> f32 {
    if t <= 0.0 {
        FLOOR_GAIN
    } else if t < ATTACK_SECS {
        FLOOR_GAIN * (PEAK_GAIN / FLOOR_GAIN).powf(t / ATTACK_SECS)
    } else if t < DECAY_END_SECS {
        let progress = (t - ATTACK_SECS) / (DECAY_END_SECS - ATTACK_SECS);
        PEAK_GAIN * (FLOOR_GAIN / PEAK_GAIN).powf(progress)
    } else {
        FLOOR_GAIN
    }
}

/// Render the chime as mono samples.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (typically 48000)
///
/// # Returns
/// `CHIME_DURATION_SECS` worth of samples with peak amplitude of at most 0.2
pub fn synthesize_chime(sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * CHIME_DURATION_SECS) as usize;
    let omega = 2.0 * std::f32::consts::PI * CHIME_FREQUENCY_HZ;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (omega * t).sin() * chime_envelope(t)
        })
        .collect()
}

/// Something that can sound the completion chime.
///
/// Playback failures are logged and swallowed; the chime is a best-effort cue.
pub trait ChimePlayer: Send + Sync {
    fn play_chime(&self);
}

/// Chime player that only counts requests.
#[derive(Debug, Default)]
pub struct SilentChime {
    plays: AtomicUsize,
}

impl SilentChime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl ChimePlayer for SilentChime {
    fn play_chime(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
        log::debug!("[Chime] silent chime #{}", self.count());
    }
}

#[cfg(not(target_os = "android"))]
pub use device::CpalChime;

#[cfg(not(target_os = "android"))]
mod device {
    use std::sync::{Arc, Mutex};

    use super::{synthesize_chime, ChimePlayer};
    use crate::audio::backend::wav::{PcmTrack, PlaybackShared};
    use crate::audio::output::{spawn_output, OutputHandle};
    use crate::error::AudioError;

    /// Chime rendered on its own output stream.
    pub struct CpalChime {
        shared: Arc<Mutex<PlaybackShared>>,
        _output: OutputHandle,
    }

    impl CpalChime {
        pub fn open() -> Result<Self, AudioError> {
            let shared = Arc::new(Mutex::new(PlaybackShared::default()));
            let callback_shared = Arc::clone(&shared);

            let output = spawn_output("chime", move |data, channels, rate| {
                match callback_shared.try_lock() {
                    Ok(mut state) => state.render(data, channels, rate),
                    Err(_) => data.fill(0.0),
                }
            })?;

            let rate = output.sample_rate();
            let track = PcmTrack {
                samples: synthesize_chime(rate),
                channels: 1,
                sample_rate: rate,
            };
            shared
                .lock()
                .map_err(|_| AudioError::LockPoisoned {
                    component: "chime".to_string(),
                })?
                .track = Some(Arc::new(track));

            Ok(Self {
                shared,
                _output: output,
            })
        }
    }

    impl ChimePlayer for CpalChime {
        fn play_chime(&self) {
            match self.shared.lock() {
                Ok(mut state) => {
                    state.cursor = 0.0;
                    state.ended = false;
                    state.playing = true;
                }
                Err(_) => log::warn!("[Chime] playback state poisoned, skipping chime"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chime_length() {
        let chime = synthesize_chime(48000);
        assert_eq!(chime.len(), 40800);
    }

    #[test]
    fn test_chime_is_deterministic() {
        assert_eq!(synthesize_chime(44100), synthesize_chime(44100));
    }

    #[test]
    fn test_chime_peak_bounded() {
        let chime = synthesize_chime(48000);
        let peak = chime.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= PEAK_GAIN + 1e-6);
        assert!(peak > 0.15, "peak {} too quiet", peak);
    }

    #[test]
    fn test_envelope_shape() {
        assert!((chime_envelope(0.0) - FLOOR_GAIN).abs() < 1e-9);
        assert!((chime_envelope(ATTACK_SECS) - PEAK_GAIN).abs() < 1e-4);
        assert!(chime_envelope(0.4) < chime_envelope(0.1));
        assert!((chime_envelope(0.84) - FLOOR_GAIN).abs() < 1e-9);
    }

    #[test]
    fn test_silent_chime_counts() {
        let chime = SilentChime::new();
        chime.play_chime();
        chime.play_chime();
        assert_eq!(chime.count(), 2);
    }
}
