// CalmEase Core - relaxation audio engine
// Two-channel playback, session timer with fade-out, breathing guidance

pub mod assets;
pub mod audio;
pub mod breathing;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod favorites;
pub mod preferences;
pub mod session;

pub use config::AppConfig;
pub use context::{ContextDeps, ReliefContext};
pub use error::ReliefError;
