//! AudioChannel - one independently controllable playback lane
//!
//! A channel wraps a [`MediaBackend`] and owns the observable playback state
//! (source, volume, loop, rate, playing flag, position, last error). Every
//! state change is mirrored on a broadcast stream of [`ChannelEvent`]s.
//!
//! `play` is the only async operation. A play that is still pending when a
//! newer `play`, `pause`, `stop` or `load` arrives is superseded: its outcome
//! is returned to the caller but never written over the newer state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

use super::backend::MediaBackend;
use crate::error::{log_audio_error, AudioError, PlaybackErrorCode};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Voice,
    Background,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Voice => "voice",
            ChannelKind::Background => "background",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEventKind {
    Play,
    Pause,
    LoadedMetadata { duration: f64 },
    TimeUpdate { current_time: f64 },
    VolumeChange { volume: f32 },
    Ended,
    Error { code: PlaybackErrorCode, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelEvent {
    pub channel: ChannelKind,
    #[serde(flatten)]
    pub kind: ChannelEventKind,
}

/// Point-in-time copy of a channel's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub kind: ChannelKind,
    pub source: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub looping: bool,
    pub playback_rate: f32,
    pub last_error: Option<PlaybackErrorCode>,
}

struct ChannelState {
    source: Option<String>,
    volume: f32,
    looping: bool,
    playback_rate: f32,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    last_error: Option<PlaybackErrorCode>,
    /// Bumped by every operation that supersedes a pending play
    epoch: u64,
}

pub struct AudioChannel {
    kind: ChannelKind,
    backend: Arc<dyn MediaBackend>,
    state: Mutex<ChannelState>,
    events: broadcast::Sender<ChannelEvent>,
}

impl AudioChannel {
    pub fn new(kind: ChannelKind, backend: Arc<dyn MediaBackend>, volume: f32, looping: bool) -> Self {
        let volume = if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) };
        backend.set_volume(volume);
        backend.set_loop(looping);
        backend.set_playback_rate(1.0);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            kind,
            backend,
            state: Mutex::new(ChannelState {
                source: None,
                volume,
                looping,
                playback_rate: 1.0,
                is_playing: false,
                current_time: 0.0,
                duration: 0.0,
                last_error: None,
                epoch: 0,
            }),
            events,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Replace the loaded source without starting playback.
    pub fn load(&self, source: &str) -> Result<(), AudioError> {
        let mut state = self.state();
        self.load_locked(&mut state, source)
    }

    /// Start or resume playback, loading `source` first if it differs from
    /// the current one.
    pub async fn play(&self, source: Option<&str>) -> Result<(), AudioError> {
        let (pending, epoch) = {
            let mut state = self.state();
            self.settle_ended_locked(&mut state);

            if let Some(src) = source {
                if state.source.as_deref() != Some(src) {
                    self.load_locked(&mut state, src)?;
                }
            }

            if state.source.is_none() {
                let err = AudioError::NoSource;
                self.record_error(&mut state, &err);
                return Err(err);
            }

            state.epoch += 1;
            (self.backend.play(), state.epoch)
        };

        let outcome = pending.await;

        let mut state = self.state();
        if state.epoch != epoch {
            log::debug!(
                "[AudioChannel] {} play superseded before it resolved",
                self.kind.as_str()
            );
            return outcome;
        }

        match outcome {
            Ok(()) => {
                state.is_playing = true;
                state.last_error = None;
                self.emit(ChannelEventKind::Play);
                Ok(())
            }
            Err(err) => {
                state.is_playing = false;
                self.record_error(&mut state, &err);
                Err(err)
            }
        }
    }

    /// Halt playback, keeping the position. Idempotent.
    pub fn pause(&self) {
        let mut state = self.state();
        state.epoch += 1;
        self.backend.pause();

        if state.is_playing {
            state.is_playing = false;
            state.current_time = self.backend.position();
            self.emit(ChannelEventKind::Pause);
        }
    }

    /// Pause and rewind to the start.
    pub fn stop(&self) {
        let mut state = self.state();
        state.epoch += 1;
        self.backend.pause();
        self.backend.seek(0.0);

        let was_playing = std::mem::replace(&mut state.is_playing, false);
        state.current_time = 0.0;
        if was_playing {
            self.emit(ChannelEventKind::Pause);
        }
        self.emit(ChannelEventKind::TimeUpdate { current_time: 0.0 });
    }

    /// Seek within the loaded source; clamped to `[0, duration]`.
    pub fn seek(&self, seconds: f64) {
        let mut state = self.state();
        if state.source.is_none() || seconds.is_nan() {
            return;
        }

        let target = seconds.clamp(0.0, state.duration.max(0.0));
        self.backend.seek(target);
        state.current_time = target;
        self.emit(ChannelEventKind::TimeUpdate {
            current_time: target,
        });
    }

    /// Set the output volume, clamped to [0, 1]. NaN is ignored.
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);

        let mut state = self.state();
        state.volume = volume;
        self.backend.set_volume(volume);
        self.emit(ChannelEventKind::VolumeChange { volume });
    }

    pub fn set_playback_rate(&self, rate: f32) -> Result<(), AudioError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AudioError::InvalidPlaybackRate { rate });
        }

        let mut state = self.state();
        state.playback_rate = rate;
        self.backend.set_playback_rate(rate);
        Ok(())
    }

    pub fn set_loop(&self, looping: bool) {
        let mut state = self.state();
        state.looping = looping;
        self.backend.set_loop(looping);
    }

    /// Sample the backend position and detect the natural end of a
    /// non-looping track. No-op while paused.
    pub fn poll_progress(&self) {
        let mut state = self.state();
        if !state.is_playing {
            return;
        }

        if self.settle_ended_locked(&mut state) {
            return;
        }

        let position = self.backend.position();
        state.current_time = position;
        self.emit(ChannelEventKind::TimeUpdate {
            current_time: position,
        });
    }

    pub fn source(&self) -> Option<String> {
        self.state().source.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state().looping
    }

    pub fn playback_rate(&self) -> f32 {
        self.state().playback_rate
    }

    pub fn is_playing(&self) -> bool {
        let mut state = self.state();
        self.settle_ended_locked(&mut state);
        state.is_playing
    }

    /// Live position while playing, last known position otherwise.
    pub fn current_time(&self) -> f64 {
        let mut state = self.state();
        self.settle_ended_locked(&mut state);
        self.current_time_locked(&state)
    }

    pub fn duration(&self) -> f64 {
        self.state().duration
    }

    pub fn last_error(&self) -> Option<PlaybackErrorCode> {
        self.state().last_error
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let mut state = self.state();
        self.settle_ended_locked(&mut state);
        ChannelSnapshot {
            kind: self.kind,
            source: state.source.clone(),
            is_playing: state.is_playing,
            current_time: self.current_time_locked(&state),
            duration: state.duration,
            volume: state.volume,
            looping: state.looping,
            playback_rate: state.playback_rate,
            last_error: state.last_error,
        }
    }

    /// Flip a playing channel to paused once the backend reports a natural
    /// end. Runs on every read so the state is correct without a reporter
    /// task. Returns true when the end was observed by this call.
    fn settle_ended_locked(&self, state: &mut ChannelState) -> bool {
        if !state.is_playing || !self.backend.has_ended() {
            return false;
        }

        let position = self.backend.position();
        state.is_playing = false;
        state.current_time = position;
        state.epoch += 1;
        self.backend.pause();
        self.emit(ChannelEventKind::TimeUpdate {
            current_time: position,
        });
        self.emit(ChannelEventKind::Ended);
        self.emit(ChannelEventKind::Pause);
        true
    }

    fn current_time_locked(&self, state: &ChannelState) -> f64 {
        if state.is_playing {
            self.backend.position()
        } else {
            state.current_time
        }
    }

    fn load_locked(&self, state: &mut ChannelState, source: &str) -> Result<(), AudioError> {
        state.epoch += 1;
        if std::mem::replace(&mut state.is_playing, false) {
            self.backend.pause();
            self.emit(ChannelEventKind::Pause);
        }
        state.current_time = 0.0;

        match self.backend.load(source) {
            Ok(info) => {
                log::info!(
                    "[AudioChannel] {} loaded {} ({:.1}s)",
                    self.kind.as_str(),
                    source,
                    info.duration_seconds
                );
                state.source = Some(source.to_string());
                state.duration = info.duration_seconds;
                self.emit(ChannelEventKind::LoadedMetadata {
                    duration: info.duration_seconds,
                });
                Ok(())
            }
            Err(err) => {
                state.source = None;
                state.duration = 0.0;
                self.record_error(state, &err);
                Err(err)
            }
        }
    }

    fn record_error(&self, state: &mut ChannelState, err: &AudioError) {
        log_audio_error(err, self.kind.as_str());
        let code = err.playback_code();
        state.last_error = Some(code);
        self.emit(ChannelEventKind::Error {
            code,
            message: code.advisory().to_string(),
        });
    }

    fn emit(&self, kind: ChannelEventKind) {
        // No subscribers is not an error.
        let _ = self.events.send(ChannelEvent {
            channel: self.kind,
            kind,
        });
    }

    /// Poisoned guards are recovered; the state is plain data.
    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
