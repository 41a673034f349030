// Session module - channel coordination and the countdown/fade timer

pub mod coordinator;
pub mod timer;

pub use coordinator::{AudioSessionCoordinator, CalmNowOutcome, CalmNowPreset};
pub use timer::{FadeConfig, FadeState, SessionTimer, TimerUpdate};
