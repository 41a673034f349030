// Audio module - playback channels, backends and the completion chime

pub mod backend;
pub mod channel;
pub mod chime;
#[cfg(not(target_os = "android"))]
pub(crate) mod output;

// Re-export commonly used types for convenience
pub use backend::{AutoplayPolicy, MediaBackend, MediaInfo, SimulatedBackend};
#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
pub use channel::{AudioChannel, ChannelEvent, ChannelEventKind, ChannelKind, ChannelSnapshot};
pub use chime::{synthesize_chime, ChimePlayer, SilentChime};
#[cfg(not(target_os = "android"))]
pub use chime::CpalChime;
