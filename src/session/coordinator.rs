// AudioSessionCoordinator: owns the voice and background channels
//
// Every UI-facing playback action goes through here. The two channels are
// independent: an operation on one never touches the other, except for the
// composite calm-now shortcut and stop_all.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::{AudioChannel, ChannelEvent, ChannelKind, ChannelSnapshot, MediaBackend};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Volumes and tracks applied by [`AudioSessionCoordinator::calm_now`]
#[derive(Debug, Clone, PartialEq)]
pub struct CalmNowPreset {
    pub voice_volume: f32,
    pub background_volume: f32,
    pub voice_track: String,
    pub background_track: String,
}

impl From<&AudioConfig> for CalmNowPreset {
    fn from(config: &AudioConfig) -> Self {
        Self {
            voice_volume: config.calm_now_voice_volume,
            background_volume: config.calm_now_background_volume,
            voice_track: config.calm_now_voice_track.clone(),
            background_track: config.calm_now_background_track.clone(),
        }
    }
}

/// Per-channel results of a calm-now request.
///
/// One channel failing never prevents the other from playing.
#[derive(Debug, Clone, PartialEq)]
pub struct CalmNowOutcome {
    pub voice: Result<(), AudioError>,
    pub background: Result<(), AudioError>,
}

impl CalmNowOutcome {
    pub fn is_ok(&self) -> bool {
        self.voice.is_ok() && self.background.is_ok()
    }
}

/// Owns both playback channels and mediates transitions between them
///
/// # Example
/// ```ignore
/// let coordinator = AudioSessionCoordinator::new(voice_backend, bg_backend, &config.audio);
/// coordinator.play_bg(Some("/sounds/gentle-rain.wav")).await?;
/// coordinator.set_volume(ChannelKind::Background, 0.3);
/// coordinator.stop_all();
/// ```
pub struct AudioSessionCoordinator {
    voice: Arc<AudioChannel>,
    background: Arc<AudioChannel>,
    calm_now: CalmNowPreset,
}

impl AudioSessionCoordinator {
    /// Create a coordinator over two backends
    ///
    /// The voice channel starts non-looping at `config.voice_volume`; the
    /// background channel loops at `config.background_volume`.
    pub fn new(
        voice_backend: Arc<dyn MediaBackend>,
        background_backend: Arc<dyn MediaBackend>,
        config: &AudioConfig,
    ) -> Self {
        Self {
            voice: Arc::new(AudioChannel::new(
                ChannelKind::Voice,
                voice_backend,
                config.voice_volume,
                false,
            )),
            background: Arc::new(AudioChannel::new(
                ChannelKind::Background,
                background_backend,
                config.background_volume,
                true,
            )),
            calm_now: CalmNowPreset::from(config),
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> &AudioChannel {
        match kind {
            ChannelKind::Voice => self.voice.as_ref(),
            ChannelKind::Background => self.background.as_ref(),
        }
    }

    /// Play the voice channel
    ///
    /// # Arguments
    /// * `source` - Track to play; `None` resumes the current one
    ///
    /// # Errors
    /// Whatever the channel reports (autoplay rejection, load failure, no
    /// source). Failures are not retried.
    pub async fn play_voice(&self, source: Option<&str>) -> Result<(), AudioError> {
        self.voice.play(source).await
    }

    /// Play the background channel; see [`Self::play_voice`]
    pub async fn play_bg(&self, source: Option<&str>) -> Result<(), AudioError> {
        self.background.play(source).await
    }

    pub fn pause_voice(&self) {
        self.voice.pause();
    }

    pub fn pause_bg(&self) {
        self.background.pause();
    }

    pub fn stop_voice(&self) {
        self.voice.stop();
    }

    pub fn stop_bg(&self) {
        self.background.stop();
    }

    /// Pause both channels; positions and sources are kept.
    pub fn stop_all(&self) {
        log::info!("[Coordinator] stop_all");
        self.voice.pause();
        self.background.pause();
    }

    /// Start the calming voice and background pair at preset volumes
    ///
    /// Volumes are applied before either play is issued. Both plays run
    /// concurrently and their outcomes are reported independently.
    pub async fn calm_now(&self) -> CalmNowOutcome {
        log::info!(
            "[Coordinator] calm_now voice={} background={}",
            self.calm_now.voice_track,
            self.calm_now.background_track
        );

        self.voice.set_volume(self.calm_now.voice_volume);
        self.background.set_volume(self.calm_now.background_volume);

        let (voice, background) = futures::join!(
            self.voice.play(Some(self.calm_now.voice_track.as_str())),
            self.background.play(Some(self.calm_now.background_track.as_str())),
        );

        CalmNowOutcome { voice, background }
    }

    /// Pause `source` if it is what the background channel is playing,
    /// otherwise play it.
    ///
    /// # Returns
    /// Whether the background channel is playing afterwards
    pub async fn toggle_background(&self, source: &str) -> Result<bool, AudioError> {
        let current = self.background.source();
        if self.background.is_playing() && current.as_deref() == Some(source) {
            self.background.pause();
            return Ok(false);
        }

        self.background.play(Some(source)).await?;
        Ok(true)
    }

    pub fn set_volume(&self, kind: ChannelKind, volume: f32) {
        self.channel(kind).set_volume(volume);
    }

    pub fn volume(&self, kind: ChannelKind) -> f32 {
        self.channel(kind).volume()
    }

    pub fn seek(&self, kind: ChannelKind, seconds: f64) {
        self.channel(kind).seek(seconds);
    }

    pub fn set_loop(&self, kind: ChannelKind, looping: bool) {
        self.channel(kind).set_loop(looping);
    }

    pub fn set_voice_playback_rate(&self, rate: f32) -> Result<(), AudioError> {
        self.voice.set_playback_rate(rate)
    }

    pub fn is_playing(&self, kind: ChannelKind) -> bool {
        self.channel(kind).is_playing()
    }

    pub fn snapshot(&self, kind: ChannelKind) -> ChannelSnapshot {
        self.channel(kind).snapshot()
    }

    pub fn subscribe(&self, kind: ChannelKind) -> broadcast::Receiver<ChannelEvent> {
        self.channel(kind).subscribe()
    }

    /// Periodically sample both channels' progress
    ///
    /// The task runs until the returned handle is aborted. Must be called
    /// from within a tokio runtime.
    pub fn spawn_progress_reporter(&self, interval: Duration) -> JoinHandle<()> {
        let voice = Arc::clone(&self.voice);
        let background = Arc::clone(&self.background);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                voice.poll_progress();
                background.poll_progress();
            }
        })
    }
}
