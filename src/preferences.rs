//! Key-value preference storage and the player preferences kept in it
//!
//! Preferences are small string values under fixed keys. Reads happen once at
//! startup, writes on every change. A store that cannot be read or written
//! degrades to defaults; callers decide whether a write failure matters.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::{log_storage_error, StorageError};

pub const KEY_SELECTED_TRACK: &str = "med:selected";
pub const KEY_SPEED: &str = "med:speed";
pub const KEY_LOOP: &str = "med:loop";
pub const KEY_MINUTES: &str = "med:minutes";
pub const KEY_THEME: &str = "calmease:theme";

pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_SESSION_MINUTES: u32 = 10;

/// String key-value store backing preferences and favorites
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Volatile store, used by tests and when no data directory is available
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.values.lock().map_err(|_| StorageError::Unavailable {
            reason: "memory store lock poisoned".to_string(),
        })
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object
///
/// The file is read once on open. Each mutation rewrites the whole file
/// through a temporary sibling and a rename, so a crash never leaves a
/// half-written file behind.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFilePreferenceStore {
    /// Open the store at `path`
    ///
    /// A missing file starts empty. A corrupt file is logged and also starts
    /// empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(values) => {
                    log::info!("[Preferences] Loaded {} keys from {:?}", values.len(), path);
                    values
                }
                Err(err) => {
                    log_storage_error(
                        &StorageError::Corrupt {
                            key: path.display().to_string(),
                            reason: err.to_string(),
                        },
                        "preferences_open",
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                log_storage_error(&StorageError::from(err), "preferences_open");
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.values.lock().map_err(|_| StorageError::Unavailable {
            reason: "preference file lock poisoned".to_string(),
        })
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(values).map_err(|e| StorageError::Io {
            details: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.lock()?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.lock()?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Voice player settings restored at startup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPreferences {
    pub selected_track: String,
    pub speed: f32,
    pub looping: bool,
    /// Countdown length for a relaxation session; 0 disables the timer
    pub session_minutes: u32,
    pub theme: Theme,
}

impl PlayerPreferences {
    pub fn defaults(default_track: &str) -> Self {
        Self {
            selected_track: default_track.to_string(),
            speed: DEFAULT_SPEED,
            looping: false,
            session_minutes: DEFAULT_SESSION_MINUTES,
            theme: Theme::Light,
        }
    }

    /// Read every key, substituting defaults for missing or invalid values.
    pub fn load(store: &dyn PreferenceStore, default_track: &str) -> Self {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value,
            Err(err) => {
                log_storage_error(&err, key);
                None
            }
        };

        let mut prefs = Self::defaults(default_track);
        if let Some(track) = read(KEY_SELECTED_TRACK).filter(|t| !t.is_empty()) {
            prefs.selected_track = track;
        }
        if let Some(speed) = read(KEY_SPEED).and_then(|v| v.parse::<f32>().ok()) {
            if speed.is_finite() && speed > 0.0 {
                prefs.speed = speed;
            }
        }
        prefs.looping = read(KEY_LOOP).as_deref() == Some("true");
        if let Some(minutes) = read(KEY_MINUTES).and_then(|v| v.parse::<u32>().ok()) {
            prefs.session_minutes = minutes;
        }
        if let Some(theme) = read(KEY_THEME) {
            prefs.theme = Theme::parse(&theme);
        }
        prefs
    }

    pub fn set_selected_track(
        &mut self,
        store: &dyn PreferenceStore,
        track: &str,
    ) -> Result<(), StorageError> {
        self.selected_track = track.to_string();
        store.set(KEY_SELECTED_TRACK, track)
    }

    pub fn set_speed(&mut self, store: &dyn PreferenceStore, speed: f32) -> Result<(), StorageError> {
        self.speed = speed;
        store.set(KEY_SPEED, &speed.to_string())
    }

    pub fn set_looping(&mut self, store: &dyn PreferenceStore, looping: bool) -> Result<(), StorageError> {
        self.looping = looping;
        store.set(KEY_LOOP, if looping { "true" } else { "false" })
    }

    pub fn set_session_minutes(
        &mut self,
        store: &dyn PreferenceStore,
        minutes: u32,
    ) -> Result<(), StorageError> {
        self.session_minutes = minutes;
        store.set(KEY_MINUTES, &minutes.to_string())
    }

    pub fn set_theme(&mut self, store: &dyn PreferenceStore, theme: Theme) -> Result<(), StorageError> {
        self.theme = theme;
        store.set(KEY_THEME, theme.as_str())
    }

    pub fn session_seconds(&self) -> u64 {
        self.session_minutes as u64 * 60
    }
}
