//! Fixed ambient sound catalog and asset path resolution.
//!
//! The ambient sounds are a closed set shipped with the application. Paths are
//! expressed the way the player requests them (`/sounds/<file>.wav`) and are
//! mapped onto disk by [`AssetResolver`] for file-backed playback.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Voice track played by the calm-now shortcut.
pub const CALM_NOW_VOICE_TRACK: &str = "/sounds/voice-guided.wav";
/// Background track played by the calm-now shortcut.
pub const CALM_NOW_BACKGROUND_TRACK: &str = "/sounds/soft-piano.wav";
/// Voice guidance track selected when no preference is stored.
pub const DEFAULT_VOICE_TRACK: &str = "/sounds/voice-guided.wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    Water,
    Rain,
    Nature,
    Night,
    Wind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbientSound {
    pub id: &'static str,
    pub name: &'static str,
    pub src: &'static str,
    pub category: SoundCategory,
}

const fn sound(
    id: &'static str,
    name: &'static str,
    src: &'static str,
    category: SoundCategory,
) -> AmbientSound {
    AmbientSound {
        id,
        name,
        src,
        category,
    }
}

/// Background sounds offered in the ambience picker.
pub const AMBIENT_SOUNDS: [AmbientSound; 12] = [
    sound("ocean-waves", "Ocean Waves", "/sounds/ocean-waves.wav", SoundCategory::Water),
    sound("gentle-rain", "Gentle Rain", "/sounds/gentle-rain.wav", SoundCategory::Rain),
    sound("forest-ambience", "Forest Ambience", "/sounds/forest-ambience.wav", SoundCategory::Nature),
    sound("mountain-stream", "Mountain Stream", "/sounds/mountain-stream.wav", SoundCategory::Water),
    sound("summer-meadow", "Summer Meadow", "/sounds/summer-meadow.wav", SoundCategory::Nature),
    sound("thunderstorm", "Distant Thunderstorm", "/sounds/thunderstorm.wav", SoundCategory::Rain),
    sound("beach-waves", "Beach Waves", "/sounds/beach-waves.wav", SoundCategory::Water),
    sound("autumn-forest", "Autumn Forest", "/sounds/autumn-forest.wav", SoundCategory::Nature),
    sound("night-crickets", "Night Crickets", "/sounds/night-crickets.wav", SoundCategory::Night),
    sound("mountain-wind", "Mountain Wind", "/sounds/mountain-wind.wav", SoundCategory::Wind),
    sound("tropical-jungle", "Tropical Jungle", "/sounds/tropical-jungle.wav", SoundCategory::Nature),
    sound("winter-wind", "Winter Wind", "/sounds/winter-wind.wav", SoundCategory::Wind),
];

/// Short list used by the quick-relief panel.
pub const EMERGENCY_SOUNDS: [AmbientSound; 3] = [
    sound("ocean", "Ocean Waves", "/sounds/ocean.wav", SoundCategory::Water),
    sound("rain", "Rain", "/sounds/rain.wav", SoundCategory::Rain),
    sound("forest", "Forest", "/sounds/forest.wav", SoundCategory::Nature),
];

/// Look up an ambient sound by id across both lists.
pub fn find_sound(id: &str) -> Option<&'static AmbientSound> {
    AMBIENT_SOUNDS
        .iter()
        .chain(EMERGENCY_SOUNDS.iter())
        .find(|s| s.id == id)
}

pub fn sounds_in_category(category: SoundCategory) -> impl Iterator<Item = &'static AmbientSound> {
    AMBIENT_SOUNDS.iter().filter(move |s| s.category == category)
}

/// Maps player source strings onto filesystem paths.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file://` prefixes are stripped, `/sounds/...` lands under the asset
    /// root, anything else is taken as a literal path.
    pub fn resolve(&self, source: &str) -> PathBuf {
        if let Some(path) = source.strip_prefix("file://") {
            return PathBuf::from(path);
        }
        if source.starts_with("/sounds/") {
            return self.root.join(source.trim_start_matches('/'));
        }
        PathBuf::from(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ambient_ids_are_unique() {
        let ids: HashSet<_> = AMBIENT_SOUNDS
            .iter()
            .chain(EMERGENCY_SOUNDS.iter())
            .map(|s| s.id)
            .collect();
        assert_eq!(ids.len(), AMBIENT_SOUNDS.len() + EMERGENCY_SOUNDS.len());
    }

    #[test]
    fn test_every_src_is_a_sounds_path() {
        for s in AMBIENT_SOUNDS.iter().chain(EMERGENCY_SOUNDS.iter()) {
            assert!(s.src.starts_with("/sounds/"), "{} has src {}", s.id, s.src);
            assert!(s.src.ends_with(".wav"));
        }
    }

    #[test]
    fn test_find_sound() {
        assert_eq!(find_sound("thunderstorm").unwrap().name, "Distant Thunderstorm");
        assert_eq!(find_sound("rain").unwrap().src, "/sounds/rain.wav");
        assert!(find_sound("waterfall").is_none());
    }

    #[test]
    fn test_sounds_in_category() {
        let wind: Vec<_> = sounds_in_category(SoundCategory::Wind).map(|s| s.id).collect();
        assert_eq!(wind, vec!["mountain-wind", "winter-wind"]);
    }

    #[test]
    fn test_resolver() {
        let resolver = AssetResolver::new("/opt/calmease/public");
        assert_eq!(
            resolver.resolve("/sounds/rain.wav"),
            PathBuf::from("/opt/calmease/public/sounds/rain.wav")
        );
        assert_eq!(
            resolver.resolve("file:///home/me/track.wav"),
            PathBuf::from("/home/me/track.wav")
        );
        assert_eq!(resolver.resolve("relative/a.wav"), PathBuf::from("relative/a.wav"));
    }
}
