// ReliefContext: Dependency Injection Container
// Wires the coordinator, engine, timer and stores built from one AppConfig

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::audio::{ChannelKind, ChimePlayer, MediaBackend};
use crate::breathing::{BreathingEngine, BreathingPattern};
use crate::catalog::{TrackCatalog, TrackKind};
use crate::config::AppConfig;
use crate::error::{
    log_audio_error, log_session_error, log_storage_error, ReliefError, SessionError, StorageError,
};
use crate::favorites::FavoritesStore;
use crate::preferences::{PlayerPreferences, PreferenceStore, Theme};
use crate::session::{AudioSessionCoordinator, CalmNowOutcome, SessionTimer};

mod subscriptions;

/// Collaborators injected into a [`ReliefContext`]
pub struct ContextDeps {
    pub voice_backend: Arc<dyn MediaBackend>,
    pub background_backend: Arc<dyn MediaBackend>,
    pub chime: Arc<dyn ChimePlayer>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub catalog: Arc<dyn TrackCatalog>,
}

/// ReliefContext: single owner of all application state
///
/// Nothing here is global; every caller builds its own context and tests
/// use fresh instances with simulated backends.
///
/// # Example
/// ```ignore
/// let ctx = ReliefContext::new(AppConfig::load(), deps)?;
/// ctx.start_relaxation().await?;
/// let mut timer_rx = ctx.subscribe_timer();
/// ```
pub struct ReliefContext {
    config: AppConfig,
    coordinator: Arc<AudioSessionCoordinator>,
    breathing: BreathingEngine,
    timer: SessionTimer,
    favorites: FavoritesStore,
    preference_store: Arc<dyn PreferenceStore>,
    preferences: Mutex<PlayerPreferences>,
    catalog: Arc<dyn TrackCatalog>,
}

impl ReliefContext {
    /// Build every component from `config`
    ///
    /// Stored preferences are read once here and applied to the voice
    /// channel (speed and loop).
    ///
    /// # Errors
    /// `SessionError::InvalidFade` if the session fade configuration is invalid
    pub fn new(config: AppConfig, deps: ContextDeps) -> Result<Self, ReliefError> {
        let coordinator = Arc::new(AudioSessionCoordinator::new(
            deps.voice_backend,
            deps.background_backend,
            &config.audio,
        ));
        let timer = SessionTimer::new(
            Arc::clone(&coordinator),
            ChannelKind::Voice,
            deps.chime,
            &config.session,
        )?;

        let preferences =
            PlayerPreferences::load(deps.preferences.as_ref(), &config.audio.default_voice_track);
        coordinator.set_voice_playback_rate(preferences.speed)?;
        coordinator.set_loop(ChannelKind::Voice, preferences.looping);

        let favorites = FavoritesStore::load(Arc::clone(&deps.preferences));

        log::info!(
            "[ReliefContext] ready: track={} speed={} minutes={}",
            preferences.selected_track,
            preferences.speed,
            preferences.session_minutes
        );

        Ok(Self {
            config,
            coordinator,
            breathing: BreathingEngine::new(),
            timer,
            favorites,
            preference_store: deps.preferences,
            preferences: Mutex::new(preferences),
            catalog: deps.catalog,
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &AudioSessionCoordinator {
        &self.coordinator
    }

    pub fn breathing(&self) -> &BreathingEngine {
        &self.breathing
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn catalog(&self) -> &dyn TrackCatalog {
        self.catalog.as_ref()
    }

    pub fn preferences(&self) -> PlayerPreferences {
        self.prefs().clone()
    }

    // ========================================================================
    // RELAXATION SESSION
    // ========================================================================

    /// Play the selected voice track and arm the session countdown
    ///
    /// A paused countdown resumes; otherwise a new countdown of the stored
    /// session length starts, unless that length is zero.
    ///
    /// # Errors
    /// The voice channel's play error, or a timer error
    pub async fn start_relaxation(&self) -> Result<(), ReliefError> {
        let prefs = self.preferences();

        self.coordinator.set_voice_playback_rate(prefs.speed)?;
        self.coordinator.set_loop(ChannelKind::Voice, prefs.looping);
        self.coordinator
            .play_voice(Some(&prefs.selected_track))
            .await?;

        if self.timer.is_active() {
            self.timer.resume()?;
        } else if prefs.session_minutes > 0 {
            self.timer.start(prefs.session_seconds())?;
        }
        Ok(())
    }

    /// Pause the voice and countdown if playing, otherwise start relaxing
    ///
    /// # Returns
    /// Whether the voice channel is playing afterwards
    pub async fn toggle_relaxation(&self) -> Result<bool, ReliefError> {
        if self.coordinator.is_playing(ChannelKind::Voice) {
            self.coordinator.pause_voice();
            self.timer.pause()?;
            return Ok(false);
        }

        self.start_relaxation().await?;
        Ok(true)
    }

    /// The "End & Fade Out" action
    pub fn end_session_with_fade(&self) -> Result<(), ReliefError> {
        self.timer
            .fade_out_now(None)
            .inspect_err(|err| log_session_error(err, "end_session_with_fade"))?;
        Ok(())
    }

    pub async fn calm_now(&self) -> CalmNowOutcome {
        self.coordinator.calm_now().await
    }

    /// Start a built-in breathing preset with the configured cycle count.
    pub fn start_breathing_preset(&self, id: &str) -> Result<(), ReliefError> {
        let pattern = BreathingPattern::preset(id, self.config.breathing.default_cycles)
            .ok_or_else(|| SessionError::InvalidPattern {
                reason: format!("unknown preset {}", id),
            })?;
        self.breathing.start(pattern)?;
        Ok(())
    }

    /// Sample channel progress at the configured interval
    pub fn start_progress_reporter(&self) -> JoinHandle<()> {
        self.coordinator
            .spawn_progress_reporter(self.config.audio.progress_interval())
    }

    // ========================================================================
    // PREFERENCES
    // Storage failures are logged and the in-memory value still applies.
    // ========================================================================

    /// Select the voice track; switches immediately if the voice is playing
    pub async fn set_selected_track(&self, track: &str) -> Result<(), ReliefError> {
        let result = self
            .prefs()
            .set_selected_track(self.preference_store.as_ref(), track);
        self.log_write(result, "set_selected_track");

        if self.coordinator.is_playing(ChannelKind::Voice) {
            self.coordinator.play_voice(Some(track)).await?;
        }
        Ok(())
    }

    pub fn set_speed(&self, speed: f32) -> Result<(), ReliefError> {
        self.coordinator
            .set_voice_playback_rate(speed)
            .inspect_err(|err| log_audio_error(err, "set_speed"))?;
        let result = self.prefs().set_speed(self.preference_store.as_ref(), speed);
        self.log_write(result, "set_speed");
        Ok(())
    }

    pub fn set_looping(&self, looping: bool) {
        self.coordinator.set_loop(ChannelKind::Voice, looping);
        let result = self
            .prefs()
            .set_looping(self.preference_store.as_ref(), looping);
        self.log_write(result, "set_looping");
    }

    /// Session length for the next relaxation start; 0 disables the timer.
    pub fn set_session_minutes(&self, minutes: u32) {
        let result = self
            .prefs()
            .set_session_minutes(self.preference_store.as_ref(), minutes);
        self.log_write(result, "set_session_minutes");
    }

    pub fn set_theme(&self, theme: Theme) {
        let result = self.prefs().set_theme(self.preference_store.as_ref(), theme);
        self.log_write(result, "set_theme");
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.prefs().theme.toggled();
        self.set_theme(next);
        next
    }

    // ========================================================================
    // CATALOG
    // ========================================================================

    /// Play an uploaded track on the channel matching its kind
    ///
    /// # Errors
    /// `StorageError::NotFound` for unknown ids, catalog I/O errors, or the
    /// channel's play error
    pub async fn play_catalog_track(&self, id: u64) -> Result<ChannelKind, ReliefError> {
        let record = self
            .catalog
            .get(id)?
            .ok_or(StorageError::NotFound { id })?;
        let reference = self
            .catalog
            .playable_reference(id)?
            .ok_or(StorageError::NotFound { id })?;

        let kind = match record.kind {
            TrackKind::Voice => ChannelKind::Voice,
            TrackKind::Background => ChannelKind::Background,
        };
        log::info!("[ReliefContext] playing catalog track {} on {}", id, kind.as_str());

        match kind {
            ChannelKind::Voice => self.coordinator.play_voice(Some(&reference)).await?,
            ChannelKind::Background => self.coordinator.play_bg(Some(&reference)).await?,
        }
        Ok(kind)
    }

    fn prefs(&self) -> MutexGuard<'_, PlayerPreferences> {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_write(&self, result: Result<(), StorageError>, context: &str) {
        if let Err(err) = result {
            log_storage_error(&err, context);
        }
    }
}

impl Drop for ReliefContext {
    fn drop(&mut self) {
        // Timer and engine abort their own tasks; stop audible output too.
        self.coordinator.stop_all();
    }
}
