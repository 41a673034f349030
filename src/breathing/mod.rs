// Breathing module - timed inhale/hold/exhale guidance

pub mod engine;
pub mod pattern;

pub use engine::{BreathingEngine, BreathingUpdate};
pub use pattern::{BreathingPattern, BreathingPhase, PRESET_IDS};
