//! Configuration management for playback presets and session timing
//!
//! This module provides runtime configuration loading from JSON files so the
//! comfort presets, fade shape and storage locations can be tuned without
//! recompiling. Every section falls back to its `Default` when the file is
//! missing, malformed, or omits a field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assets::{CALM_NOW_BACKGROUND_TRACK, CALM_NOW_VOICE_TRACK, DEFAULT_VOICE_TRACK};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub breathing: BreathingConfig,
    pub storage: StorageConfig,
}

/// Channel defaults and the "calm now" shortcut presets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Voice channel volume at startup
    pub voice_volume: f32,
    /// Background channel volume at startup
    pub background_volume: f32,
    /// Voice volume applied by calm-now
    pub calm_now_voice_volume: f32,
    /// Background volume applied by calm-now (kept below the voice)
    pub calm_now_background_volume: f32,
    pub calm_now_voice_track: String,
    pub calm_now_background_track: String,
    /// Default voice guidance track when nothing has been selected yet
    pub default_voice_track: String,
    /// Directory that `/sounds/...` asset paths resolve against
    pub assets_root: PathBuf,
    /// Interval between time-update samples while a channel plays
    pub progress_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice_volume: 0.9,
            background_volume: 0.5,
            calm_now_voice_volume: 0.9,
            calm_now_background_volume: 0.4,
            calm_now_voice_track: CALM_NOW_VOICE_TRACK.to_string(),
            calm_now_background_track: CALM_NOW_BACKGROUND_TRACK.to_string(),
            default_voice_track: DEFAULT_VOICE_TRACK.to_string(),
            assets_root: PathBuf::from("public"),
            progress_interval_ms: 250,
        }
    }
}

impl AudioConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

/// Session timer fade-out shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fade length when the countdown expires
    pub fade_duration_ms: u64,
    /// Fade length for the manual "end & fade out" action
    pub manual_fade_duration_ms: u64,
    /// Number of discrete volume steps in a fade
    pub fade_steps: u32,
    /// Lower bound for the delay between two fade steps
    pub min_step_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 3000,
            manual_fade_duration_ms: 1200,
            fade_steps: 20,
            min_step_interval_ms: 10,
        }
    }
}

/// Breathing engine defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// Cycles used by the built-in presets
    pub default_cycles: u32,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self { default_cycles: 5 }
    }
}

/// Locations of persisted preferences and uploaded tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".calmease"),
        }
    }
}

impl StorageConfig {
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file doesn't exist
    /// or its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/calmease_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.audio.voice_volume, 0.9);
        assert_eq!(config.audio.background_volume, 0.5);
        assert_eq!(config.audio.calm_now_background_volume, 0.4);
        assert_eq!(config.session.fade_steps, 20);
        assert_eq!(config.session.fade_duration_ms, 3000);
        assert_eq!(config.breathing.default_cycles, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.audio.calm_now_voice_track, config.audio.calm_now_voice_track);
        assert_eq!(parsed.session.manual_fade_duration_ms, 1200);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "session": { "fade_steps": 5 } }"#).unwrap();
        assert_eq!(parsed.session.fade_steps, 5);
        assert_eq!(parsed.session.fade_duration_ms, 3000);
        assert_eq!(parsed.audio.voice_volume, 0.9);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("/definitely/not/here/calmease.json");
        assert_eq!(config.audio.progress_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/calm"),
        };
        assert_eq!(storage.preferences_path(), PathBuf::from("/tmp/calm/preferences.json"));
        assert_eq!(storage.catalog_dir(), PathBuf::from("/tmp/calm/catalog"));
    }
}
