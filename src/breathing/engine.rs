//! BreathingEngine - drives a breathing pattern through its phases
//!
//! A single task sleeps for each phase's duration and advances the state
//! machine in [`BreathingPhase::advance`]. `start` and `stop` bump a
//! generation counter under the state lock and abort the task, so a timer
//! that fires for a replaced run changes nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::pattern::{BreathingPattern, BreathingPhase};
use crate::error::{log_session_error, SessionError};

const UPDATE_CAPACITY: usize = 64;

/// Observable engine state, broadcast on every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreathingUpdate {
    pub phase: BreathingPhase,
    pub cycle_index: u32,
    pub total_cycles: u32,
    pub guidance: &'static str,
}

struct EngineState {
    generation: u64,
    task: Option<JoinHandle<()>>,
    /// Present while a run is in progress
    pattern: Option<BreathingPattern>,
    phase: BreathingPhase,
    cycle_index: u32,
    total_cycles: u32,
}

impl EngineState {
    fn update(&self) -> BreathingUpdate {
        BreathingUpdate {
            phase: self.phase,
            cycle_index: self.cycle_index,
            total_cycles: self.total_cycles,
            guidance: self.phase.guidance(),
        }
    }
}

struct EngineShared {
    state: Mutex<EngineState>,
    updates: broadcast::Sender<BreathingUpdate>,
}

impl EngineShared {
    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::StatePoisoned {
            component: "breathing_engine".to_string(),
        })
    }

    fn emit(&self, update: BreathingUpdate) {
        let _ = self.updates.send(update);
    }
}

pub struct BreathingEngine {
    shared: Arc<EngineShared>,
}

impl BreathingEngine {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            shared: Arc::new(EngineShared {
                state: Mutex::new(EngineState {
                    generation: 0,
                    task: None,
                    pattern: None,
                    phase: BreathingPhase::Ready,
                    cycle_index: 0,
                    total_cycles: 0,
                }),
                updates,
            }),
        }
    }

    /// Begin `pattern` at cycle 1, Inhale
    ///
    /// Replaces any run in progress. The pattern is validated before any
    /// state changes.
    ///
    /// # Errors
    /// `InvalidPattern`, or `NoRuntime` when called outside a tokio runtime
    pub fn start(&self, pattern: BreathingPattern) -> Result<(), SessionError> {
        pattern
            .validate()
            .inspect_err(|err| log_session_error(err, "breathing_start"))?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut state = self.shared.lock()?;
        cancel_locked(&mut state);

        log::info!(
            "[BreathingEngine] starting {} ({} cycles)",
            pattern.name,
            pattern.total_cycles
        );
        state.total_cycles = pattern.total_cycles;
        state.pattern = Some(pattern);
        state.phase = BreathingPhase::Inhale;
        state.cycle_index = 1;

        let generation = state.generation;
        state.task = Some(runtime.spawn(run_phases(Arc::clone(&self.shared), generation)));
        self.shared.emit(state.update());
        Ok(())
    }

    /// Cancel the run and return to Ready. Idempotent.
    pub fn stop(&self) -> Result<(), SessionError> {
        let mut state = self.shared.lock()?;
        cancel_locked(&mut state);

        let changed = state.phase != BreathingPhase::Ready;
        state.pattern = None;
        state.phase = BreathingPhase::Ready;
        state.cycle_index = 0;
        state.total_cycles = 0;

        if changed {
            log::info!("[BreathingEngine] stopped");
            self.shared.emit(state.update());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> BreathingUpdate {
        match self.shared.lock() {
            Ok(state) => state.update(),
            Err(_) => BreathingUpdate {
                phase: BreathingPhase::Ready,
                cycle_index: 0,
                total_cycles: 0,
                guidance: BreathingPhase::Ready.guidance(),
            },
        }
    }

    pub fn phase(&self) -> BreathingPhase {
        self.snapshot().phase
    }

    /// True while a pattern is running; false once it completes.
    pub fn is_active(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.pattern.is_some())
            .unwrap_or(false)
    }

    pub fn pattern(&self) -> Option<BreathingPattern> {
        self.shared.lock().ok().and_then(|s| s.pattern.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BreathingUpdate> {
        self.shared.updates.subscribe()
    }
}

impl Default for BreathingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BreathingEngine {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            cancel_locked(&mut state);
        }
    }
}

fn cancel_locked(state: &mut EngineState) {
    state.generation += 1;
    if let Some(task) = state.task.take() {
        task.abort();
    }
}

async fn run_phases(shared: Arc<EngineShared>, generation: u64) {
    loop {
        let wait = {
            let Ok(state) = shared.lock() else { return };
            if state.generation != generation {
                return;
            }
            match state
                .pattern
                .as_ref()
                .and_then(|p| p.phase_duration(state.phase))
            {
                Some(wait) => wait,
                None => return,
            }
        };

        tokio::time::sleep(wait).await;

        let Ok(mut state) = shared.lock() else { return };
        if state.generation != generation {
            return;
        }

        let (phase, cycle) = state.phase.advance(state.cycle_index, state.total_cycles);
        state.phase = phase;
        state.cycle_index = cycle;
        log::debug!("[BreathingEngine] {} (cycle {})", phase.as_str(), cycle);

        if phase == BreathingPhase::Complete {
            state.pattern = None;
            state.task = None;
            shared.emit(state.update());
            log::info!("[BreathingEngine] pattern complete");
            return;
        }
        shared.emit(state.update());
    }
}
