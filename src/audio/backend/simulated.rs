use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::error::AudioError;

use super::{MediaBackend, MediaInfo};

/// Whether `play` needs a prior user gesture, mirroring browser autoplay rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayPolicy {
    #[default]
    Allow,
    RequireGesture,
}

struct SimState {
    known_sources: HashMap<String, f64>,
    fallback_duration: Option<f64>,
    policy: AutoplayPolicy,
    gesture_granted: bool,
    loaded: Option<String>,
    duration: f64,
    playing: bool,
    base_position: f64,
    started_at: Option<Instant>,
    rate: f32,
    looping: bool,
    volume: f32,
    play_calls: usize,
}

impl SimState {
    fn raw_position(&self) -> f64 {
        match (self.playing, self.started_at) {
            (true, Some(start)) => {
                self.base_position + start.elapsed().as_secs_f64() * self.rate as f64
            }
            _ => self.base_position,
        }
    }

    fn position(&self) -> f64 {
        let raw = self.raw_position();
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            raw % self.duration
        } else {
            raw.min(self.duration)
        }
    }

    fn ended(&self) -> bool {
        self.loaded.is_some() && !self.looping && self.raw_position() >= self.duration
    }

    /// Fold elapsed play time into the base so rate/loop changes apply from now on.
    fn rebase(&mut self) {
        self.base_position = self.position();
        if self.playing {
            self.started_at = Some(Instant::now());
        }
    }
}

/// Deterministic backend used for tests and headless runs.
///
/// Position advances with the tokio clock, so tests running with a paused
/// clock observe exact timings. Sources must be registered up front with
/// their durations unless a fallback duration is configured.
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                known_sources: HashMap::new(),
                fallback_duration: None,
                policy: AutoplayPolicy::Allow,
                gesture_granted: false,
                loaded: None,
                duration: 0.0,
                playing: false,
                base_position: 0.0,
                started_at: None,
                rate: 1.0,
                looping: false,
                volume: 1.0,
                play_calls: 0,
            }),
        }
    }

    pub fn with_source(self, source: &str, duration_seconds: f64) -> Self {
        self.lock()
            .known_sources
            .insert(source.to_string(), duration_seconds);
        self
    }

    /// Accept any source, reporting the given duration for unregistered ones.
    pub fn with_fallback_duration(self, duration_seconds: f64) -> Self {
        self.lock().fallback_duration = Some(duration_seconds);
        self
    }

    pub fn with_policy(self, policy: AutoplayPolicy) -> Self {
        self.lock().policy = policy;
        self
    }

    /// Record a user interaction, lifting the autoplay restriction.
    pub fn grant_user_gesture(&self) {
        self.lock().gesture_granted = true;
    }

    pub fn is_playing(&self) -> bool {
        let state = self.lock();
        state.playing && !state.ended()
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn playback_rate(&self) -> f32 {
        self.lock().rate
    }

    pub fn is_looping(&self) -> bool {
        self.lock().looping
    }

    pub fn loaded_source(&self) -> Option<String> {
        self.lock().loaded.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for SimulatedBackend {
    fn load(&self, source: &str) -> Result<MediaInfo, AudioError> {
        let mut state = self.lock();
        let duration = state
            .known_sources
            .get(source)
            .copied()
            .or(state.fallback_duration)
            .ok_or_else(|| AudioError::LoadFailed {
                source: source.to_string(),
                reason: "resource not found".to_string(),
            })?;

        state.loaded = Some(source.to_string());
        state.duration = duration;
        state.playing = false;
        state.base_position = 0.0;
        state.started_at = None;

        Ok(MediaInfo {
            duration_seconds: duration,
        })
    }

    fn play(&self) -> BoxFuture<'static, Result<(), AudioError>> {
        let result = {
            let mut state = self.lock();
            state.play_calls += 1;

            if state.loaded.is_none() {
                Err(AudioError::NoSource)
            } else if state.policy == AutoplayPolicy::RequireGesture && !state.gesture_granted {
                Err(AudioError::PlaybackBlocked {
                    reason: "play() requires a prior user gesture".to_string(),
                })
            } else {
                if state.ended() {
                    state.base_position = 0.0;
                    state.started_at = Some(Instant::now());
                }
                if !state.playing {
                    state.playing = true;
                    state.started_at = Some(Instant::now());
                }
                Ok(())
            }
        };

        future::ready(result).boxed()
    }

    fn pause(&self) {
        let mut state = self.lock();
        if state.playing {
            state.base_position = state.position();
            state.playing = false;
            state.started_at = None;
        }
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.lock();
        state.base_position = seconds.max(0.0);
        if state.playing {
            state.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        self.lock().position()
    }

    fn has_ended(&self) -> bool {
        self.lock().ended()
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = volume;
    }

    fn set_loop(&self, looping: bool) {
        let mut state = self.lock();
        state.rebase();
        state.looping = looping;
    }

    fn set_playback_rate(&self, rate: f32) {
        let mut state = self.lock();
        state.rebase();
        state.rate = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_clock_while_playing() {
        let backend = SimulatedBackend::new().with_source("a.wav", 30.0);
        backend.load("a.wav").unwrap();
        backend.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!((backend.position() - 2.0).abs() < 1e-3);

        backend.pause();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!((backend.position() - 2.0).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_after_end_restarts_from_zero() {
        let backend = SimulatedBackend::new().with_source("a.wav", 2.0);
        backend.load("a.wav").unwrap();
        backend.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(backend.has_ended());

        backend.play().await.unwrap();
        assert!(backend.position() < 1e-3);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((backend.position() - 0.5).abs() < 1e-3);
        assert!(!backend.has_ended());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_scales_position() {
        let backend = SimulatedBackend::new().with_source("a.wav", 30.0);
        backend.load("a.wav").unwrap();
        backend.set_playback_rate(1.5);
        backend.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!((backend.position() - 3.0).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_looping_source_ends() {
        let backend = SimulatedBackend::new().with_source("short.wav", 1.0);
        backend.load("short.wav").unwrap();
        backend.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.has_ended());
        assert!(!backend.is_playing());
        assert_eq!(backend.position(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_looping_source_wraps() {
        let backend = SimulatedBackend::new().with_source("loop.wav", 4.0);
        backend.load("loop.wav").unwrap();
        backend.set_loop(true);
        backend.play().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!backend.has_ended());
        assert!((backend.position() - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_unknown_source_fails_to_load() {
        let backend = SimulatedBackend::new();
        let err = backend.load("missing.wav").unwrap_err();
        assert!(matches!(err, AudioError::LoadFailed { .. }));
        assert!(matches!(backend.play().await, Err(AudioError::NoSource)));
    }

    #[tokio::test]
    async fn test_gesture_policy() {
        let backend = SimulatedBackend::new()
            .with_source("a.wav", 10.0)
            .with_policy(AutoplayPolicy::RequireGesture);
        backend.load("a.wav").unwrap();

        assert!(matches!(
            backend.play().await,
            Err(AudioError::PlaybackBlocked { .. })
        ));

        backend.grant_user_gesture();
        assert!(backend.play().await.is_ok());
        assert_eq!(backend.play_calls(), 2);
    }
}
