//! SessionTimer - countdown with fade-out, pause, volume restore and chime
//!
//! The countdown derives the remaining time from elapsed clock time rather
//! than counting ticks, so a late tick never stretches the session. At zero
//! the governed channel fades to silence in discrete steps, is paused, gets
//! its original volume back, and the completion chime sounds.
//!
//! One task per timer drives both the countdown and the fade. Every control
//! operation bumps a generation counter under the state lock and aborts the
//! task, so a callback from a superseded run observes the mismatch and does
//! nothing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::coordinator::AudioSessionCoordinator;
use crate::audio::{ChannelKind, ChimePlayer};
use crate::config::SessionConfig;
use crate::error::{log_session_error, SessionError};

const UPDATE_CAPACITY: usize = 64;

/// Validated fade shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeConfig {
    duration: Duration,
    steps: u32,
    min_step_interval: Duration,
}

impl FadeConfig {
    /// # Errors
    /// `InvalidFade` when `steps` is zero or `duration` is zero
    pub fn new(
        duration: Duration,
        steps: u32,
        min_step_interval: Duration,
    ) -> Result<Self, SessionError> {
        if steps == 0 {
            return Err(SessionError::InvalidFade {
                reason: "steps must be at least 1".to_string(),
            });
        }
        if duration.is_zero() {
            return Err(SessionError::InvalidFade {
                reason: "duration must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            duration,
            steps,
            min_step_interval,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::new(
            Duration::from_millis(config.fade_duration_ms),
            config.fade_steps,
            Duration::from_millis(config.min_step_interval_ms),
        )
    }

    pub fn with_duration(self, duration: Duration) -> Result<Self, SessionError> {
        Self::new(duration, self.steps, self.min_step_interval)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Delay between two steps, never below the configured minimum.
    pub fn step_interval(&self) -> Duration {
        (self.duration / self.steps).max(self.min_step_interval)
    }

    /// Volume after `step` of `steps`, linear from `from` down to zero.
    pub fn volume_at(&self, from: f32, step: u32) -> f32 {
        let remaining = self.steps.saturating_sub(step) as f32 / self.steps as f32;
        from * remaining
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeState {
    Idle,
    FadingOut,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerUpdate {
    Tick { remaining_seconds: u64 },
    Paused { remaining_seconds: u64 },
    FadeStarted { from_volume: f32, duration_ms: u64 },
    FadeStep { step: u32, volume: f32 },
    Completed,
    Cancelled,
}

struct TimerState {
    generation: u64,
    task: Option<JoinHandle<()>>,
    total_seconds: u64,
    /// Countdown time accumulated before the current run segment
    elapsed_before: Duration,
    /// Start of the current run segment; `None` while paused or idle
    started_at: Option<Instant>,
    remaining: Option<u64>,
    fade_state: FadeState,
    pre_fade_volume: Option<f32>,
}

impl TimerState {
    fn elapsed(&self) -> Duration {
        self.elapsed_before + self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }

    fn is_counting(&self) -> bool {
        self.started_at.is_some()
    }

    fn is_paused(&self) -> bool {
        self.started_at.is_none() && self.remaining.is_some() && self.fade_state == FadeState::Idle
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    coordinator: Arc<AudioSessionCoordinator>,
    channel: ChannelKind,
    chime: Arc<dyn ChimePlayer>,
    updates: broadcast::Sender<TimerUpdate>,
}

impl TimerShared {
    fn lock(&self) -> Result<MutexGuard<'_, TimerState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::StatePoisoned {
            component: "session_timer".to_string(),
        })
    }

    fn emit(&self, update: TimerUpdate) {
        let _ = self.updates.send(update);
    }

    /// Stop any running task and undo a partial fade.
    ///
    /// Returns whether a countdown or fade was actually interrupted.
    fn abort_locked(&self, state: &mut TimerState) -> bool {
        state.generation += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }

        let was_active = state.is_counting() || state.fade_state == FadeState::FadingOut;
        if state.fade_state == FadeState::FadingOut {
            if let Some(volume) = state.pre_fade_volume.take() {
                self.coordinator.set_volume(self.channel, volume);
            }
            state.fade_state = FadeState::Idle;
        }
        state.started_at = None;
        was_active
    }
}

/// Countdown controller governing one coordinator channel
pub struct SessionTimer {
    shared: Arc<TimerShared>,
    fade: FadeConfig,
    manual_fade_duration: Duration,
}

impl SessionTimer {
    /// Create a timer that fades `channel` on expiry
    ///
    /// # Errors
    /// `InvalidFade` if the configured fade has zero steps or zero duration
    pub fn new(
        coordinator: Arc<AudioSessionCoordinator>,
        channel: ChannelKind,
        chime: Arc<dyn ChimePlayer>,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let fade = FadeConfig::from_config(config)?;
        let manual_fade_duration = Duration::from_millis(config.manual_fade_duration_ms);
        // Validate the manual fade up front as well.
        fade.with_duration(manual_fade_duration)?;

        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Ok(Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    generation: 0,
                    task: None,
                    total_seconds: 0,
                    elapsed_before: Duration::ZERO,
                    started_at: None,
                    remaining: None,
                    fade_state: FadeState::Idle,
                    pre_fade_volume: None,
                }),
                coordinator,
                channel,
                chime,
                updates,
            }),
            fade,
            manual_fade_duration,
        })
    }

    pub fn fade_config(&self) -> FadeConfig {
        self.fade
    }

    /// Start a countdown of `seconds`
    ///
    /// Zero is a no-op. Any previous countdown or fade is cancelled first,
    /// restoring the pre-fade volume if a fade was in progress.
    ///
    /// # Errors
    /// `NoRuntime` outside a tokio runtime, `StatePoisoned` on lock poisoning
    pub fn start(&self, seconds: u64) -> Result<(), SessionError> {
        if seconds == 0 {
            log::debug!("[SessionTimer] start(0) ignored");
            return Ok(());
        }
        let runtime = current_runtime()?;

        let mut state = self.shared.lock()?;
        self.shared.abort_locked(&mut state);

        state.total_seconds = seconds;
        state.elapsed_before = Duration::ZERO;
        state.started_at = Some(Instant::now());
        state.remaining = Some(seconds);
        state.fade_state = FadeState::Idle;
        state.pre_fade_volume = None;

        let generation = state.generation;
        state.task = Some(runtime.spawn(run_countdown(
            Arc::clone(&self.shared),
            generation,
            self.fade,
        )));

        log::info!("[SessionTimer] countdown started: {}s", seconds);
        self.shared.emit(TimerUpdate::Tick {
            remaining_seconds: seconds,
        });
        Ok(())
    }

    /// Freeze the countdown. No effect while fading or idle.
    pub fn pause(&self) -> Result<(), SessionError> {
        let mut state = self.shared.lock()?;
        if !state.is_counting() || state.fade_state != FadeState::Idle {
            return Ok(());
        }

        state.elapsed_before = state.elapsed();
        state.started_at = None;
        state.generation += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }

        let remaining = state
            .total_seconds
            .saturating_sub(state.elapsed_before.as_secs());
        state.remaining = Some(remaining);
        self.shared.emit(TimerUpdate::Paused {
            remaining_seconds: remaining,
        });
        Ok(())
    }

    /// Continue a paused countdown.
    pub fn resume(&self) -> Result<(), SessionError> {
        let mut state = self.shared.lock()?;
        if !state.is_paused() {
            return Ok(());
        }
        let runtime = current_runtime()?;

        state.started_at = Some(Instant::now());
        state.generation += 1;
        let generation = state.generation;
        state.task = Some(runtime.spawn(run_countdown(
            Arc::clone(&self.shared),
            generation,
            self.fade,
        )));
        Ok(())
    }

    /// Stop the countdown or fade immediately
    ///
    /// The channel volume is untouched unless a fade was interrupted, in
    /// which case the pre-fade volume is restored.
    pub fn cancel(&self) -> Result<(), SessionError> {
        let mut state = self.shared.lock()?;
        let was_paused = state.is_paused();
        let interrupted = self.shared.abort_locked(&mut state);
        state.remaining = None;
        state.elapsed_before = Duration::ZERO;

        if interrupted || was_paused {
            log::info!("[SessionTimer] cancelled");
            self.shared.emit(TimerUpdate::Cancelled);
        }
        Ok(())
    }

    /// Skip the remaining countdown and fade out now
    ///
    /// # Arguments
    /// * `duration` - Fade length; defaults to the manual fade duration
    ///
    /// # Errors
    /// `InvalidFade` for a zero duration, `NoRuntime` outside a runtime
    pub fn fade_out_now(&self, duration: Option<Duration>) -> Result<(), SessionError> {
        let fade = self
            .fade
            .with_duration(duration.unwrap_or(self.manual_fade_duration))
            .inspect_err(|err| log_session_error(err, "fade_out_now"))?;
        let runtime = current_runtime()?;

        let mut state = self.shared.lock()?;
        self.shared.abort_locked(&mut state);

        let generation = state.generation;
        state.task = Some(runtime.spawn(run_fade(Arc::clone(&self.shared), generation, fade)));
        Ok(())
    }

    /// Whole seconds left, `None` when no countdown exists
    pub fn remaining(&self) -> Option<u64> {
        self.shared.lock().ok().and_then(|s| s.remaining)
    }

    pub fn fade_state(&self) -> FadeState {
        self.shared
            .lock()
            .map(|s| s.fade_state)
            .unwrap_or(FadeState::Idle)
    }

    /// True while the countdown is running (not paused, not fading).
    pub fn is_counting(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.is_counting())
            .unwrap_or(false)
    }

    /// True while a countdown exists, running or paused.
    pub fn is_active(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.remaining.is_some() && s.fade_state == FadeState::Idle)
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerUpdate> {
        self.shared.updates.subscribe()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.generation += 1;
            if let Some(task) = state.task.take() {
                task.abort();
            }
        }
    }
}

fn current_runtime() -> Result<Handle, SessionError> {
    Handle::try_current().map_err(|_| {
        let err = SessionError::NoRuntime;
        log_session_error(&err, "session_timer");
        err
    })
}

async fn run_countdown(shared: Arc<TimerShared>, generation: u64, fade: FadeConfig) {
    loop {
        let wait = {
            let Ok(state) = shared.lock() else { return };
            if state.generation != generation {
                return;
            }
            let elapsed = state.elapsed();
            Duration::from_secs(elapsed.as_secs() + 1).saturating_sub(elapsed)
        };
        tokio::time::sleep(wait).await;

        let remaining = {
            let Ok(mut state) = shared.lock() else { return };
            if state.generation != generation {
                return;
            }
            let remaining = state
                .total_seconds
                .saturating_sub(state.elapsed().as_secs());
            state.remaining = Some(remaining);
            if remaining == 0 {
                state.elapsed_before = state.elapsed();
                state.started_at = None;
            }
            remaining
        };

        shared.emit(TimerUpdate::Tick {
            remaining_seconds: remaining,
        });
        if remaining == 0 {
            break;
        }
    }

    log::info!("[SessionTimer] countdown reached zero, fading out");
    run_fade(shared, generation, fade).await;
}

async fn run_fade(shared: Arc<TimerShared>, generation: u64, fade: FadeConfig) {
    let from = {
        let Ok(mut state) = shared.lock() else { return };
        if state.generation != generation {
            return;
        }
        let from = shared.coordinator.volume(shared.channel);
        state.fade_state = FadeState::FadingOut;
        state.pre_fade_volume = Some(from);
        from
    };

    shared.emit(TimerUpdate::FadeStarted {
        from_volume: from,
        duration_ms: fade.duration().as_millis() as u64,
    });

    let interval = fade.step_interval();
    for step in 1..=fade.steps() {
        tokio::time::sleep(interval).await;

        let Ok(state) = shared.lock() else { return };
        if state.generation != generation {
            return;
        }
        let volume = fade.volume_at(from, step);
        shared.coordinator.set_volume(shared.channel, volume);
        drop(state);

        shared.emit(TimerUpdate::FadeStep { step, volume });
    }

    {
        let Ok(mut state) = shared.lock() else { return };
        if state.generation != generation {
            return;
        }
        shared.coordinator.channel(shared.channel).pause();
        shared.coordinator.set_volume(shared.channel, from);
        shared.chime.play_chime();

        state.fade_state = FadeState::Complete;
        state.pre_fade_volume = None;
        state.remaining = None;
        state.started_at = None;
        state.task = None;
    }

    log::info!("[SessionTimer] session complete, volume restored to {:.2}", from);
    shared.emit(TimerUpdate::Completed);
}

#[cfg(test)]
mod tests;
