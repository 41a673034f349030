//! Track catalog - local storage for user-uploaded audio
//!
//! The catalog treats audio as opaque blobs. The filesystem implementation
//! keeps each blob in `<dir>/blobs/<id>.bin` and all metadata in
//! `<dir>/index.json`; the index is rewritten on every mutation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub const DEFAULT_MIME_TYPE: &str = "audio/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Voice,
    Background,
}

impl TrackKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "voice" => Some(TrackKind::Voice),
            "background" | "bg" => Some(TrackKind::Background),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: u64,
    pub name: String,
    pub kind: TrackKind,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Storage for uploaded tracks
pub trait TrackCatalog: Send + Sync {
    /// Store `data` and return the new record id.
    fn add(
        &self,
        name: &str,
        kind: TrackKind,
        data: &[u8],
        mime_type: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<TrackRecord>, StorageError>;

    fn get(&self, id: u64) -> Result<Option<TrackRecord>, StorageError>;

    /// Source string a media backend can load, or `None` for unknown ids.
    fn playable_reference(&self, id: u64) -> Result<Option<String>, StorageError>;

    /// Delete a record and its blob. Unknown ids are ignored.
    fn remove(&self, id: u64) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogIndex {
    next_id: u64,
    tracks: Vec<TrackRecord>,
}

pub struct FsTrackCatalog {
    dir: PathBuf,
    index: Mutex<CatalogIndex>,
}

impl FsTrackCatalog {
    /// Open or create a catalog rooted at `dir`
    ///
    /// # Errors
    /// `Io` if the directories cannot be created, `Corrupt` if an existing
    /// index cannot be parsed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("blobs"))?;

        let index_path = dir.join("index.json");
        let mut index = if index_path.exists() {
            let contents = fs::read_to_string(&index_path)?;
            serde_json::from_str::<CatalogIndex>(&contents).map_err(|e| StorageError::Corrupt {
                key: index_path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            CatalogIndex::default()
        };

        let max_id = index.tracks.iter().map(|t| t.id).max().unwrap_or(0);
        index.next_id = index.next_id.max(max_id + 1).max(1);

        log::info!(
            "[Catalog] Opened {:?} with {} tracks",
            dir,
            index.tracks.len()
        );
        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: u64) -> PathBuf {
        self.dir.join("blobs").join(format!("{}.bin", id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, CatalogIndex>, StorageError> {
        self.index.lock().map_err(|_| StorageError::Unavailable {
            reason: "catalog index lock poisoned".to_string(),
        })
    }

    fn write_index(&self, index: &CatalogIndex) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(index).map_err(|e| StorageError::Io {
            details: e.to_string(),
        })?;
        let path = self.dir.join("index.json");
        let tmp = self.dir.join("index.json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl TrackCatalog for FsTrackCatalog {
    fn add(
        &self,
        name: &str,
        kind: TrackKind,
        data: &[u8],
        mime_type: Option<&str>,
    ) -> Result<u64, StorageError> {
        let mut index = self.lock()?;
        let id = index.next_id;

        fs::write(self.blob_path(id), data)?;

        index.next_id += 1;
        index.tracks.push(TrackRecord {
            id,
            name: name.to_string(),
            kind,
            created_at: now_millis(),
            mime_type: mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
            size_bytes: data.len() as u64,
        });
        self.write_index(&index)?;

        log::info!("[Catalog] Added track {} ({} bytes)", id, data.len());
        Ok(id)
    }

    fn list(&self) -> Result<Vec<TrackRecord>, StorageError> {
        let mut tracks = self.lock()?.tracks.clone();
        tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tracks)
    }

    fn get(&self, id: u64) -> Result<Option<TrackRecord>, StorageError> {
        Ok(self.lock()?.tracks.iter().find(|t| t.id == id).cloned())
    }

    fn playable_reference(&self, id: u64) -> Result<Option<String>, StorageError> {
        if self.get(id)?.is_none() {
            return Ok(None);
        }
        let path = self.blob_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound { id });
        }
        Ok(Some(format!("file://{}", path.display())))
    }

    fn remove(&self, id: u64) -> Result<(), StorageError> {
        let mut index = self.lock()?;
        let before = index.tracks.len();
        index.tracks.retain(|t| t.id != id);
        if index.tracks.len() == before {
            return Ok(());
        }

        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.write_index(&index)?;
        log::info!("[Catalog] Removed track {}", id);
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (tempfile::TempDir, FsTrackCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FsTrackCatalog::open(dir.path().join("catalog")).unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_ids_start_at_one_and_increment() {
        let (_dir, catalog) = catalog();
        let a = catalog.add("a", TrackKind::Voice, b"aaa", None).unwrap();
        let b = catalog.add("b", TrackKind::Background, b"bb", Some("audio/wav")).unwrap();
        assert_eq!((a, b), (1, 2));

        let record = catalog.get(a).unwrap().unwrap();
        assert_eq!(record.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(record.size_bytes, 3);
        assert_eq!(catalog.get(b).unwrap().unwrap().mime_type, "audio/wav");
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, catalog) = catalog();
        for name in ["one", "two", "three"] {
            catalog.add(name, TrackKind::Voice, b"x", None).unwrap();
        }
        let names: Vec<_> = catalog.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["three", "two", "one"]);
    }

    #[test]
    fn test_playable_reference_points_at_blob() {
        let (_dir, catalog) = catalog();
        let id = catalog.add("calm", TrackKind::Voice, b"RIFF", None).unwrap();

        let reference = catalog.playable_reference(id).unwrap().unwrap();
        let path = reference.strip_prefix("file://").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"RIFF");
        assert_eq!(catalog.playable_reference(99).unwrap(), None);
    }

    #[test]
    fn test_remove_deletes_blob_and_record() {
        let (_dir, catalog) = catalog();
        let id = catalog.add("gone", TrackKind::Background, b"zz", None).unwrap();
        let blob = catalog.blob_path(id);

        catalog.remove(id).unwrap();
        assert!(catalog.get(id).unwrap().is_none());
        assert!(!blob.exists());
        catalog.remove(id).unwrap();
    }

    #[test]
    fn test_reopen_keeps_records_and_counter() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("catalog");
        {
            let catalog = FsTrackCatalog::open(&root).unwrap();
            catalog.add("a", TrackKind::Voice, b"1", None).unwrap();
            let b = catalog.add("b", TrackKind::Voice, b"2", None).unwrap();
            catalog.remove(b).unwrap();
        }

        let catalog = FsTrackCatalog::open(&root).unwrap();
        assert_eq!(catalog.list().unwrap().len(), 1);
        assert_eq!(catalog.add("c", TrackKind::Voice, b"3", None).unwrap(), 3);
    }

    #[test]
    fn test_corrupt_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("blobs")).unwrap();
        fs::write(dir.path().join("index.json"), "[]]").unwrap();

        let result = FsTrackCatalog::open(dir.path());
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_track_kind_parse() {
        assert_eq!(TrackKind::parse("bg"), Some(TrackKind::Background));
        assert_eq!(TrackKind::parse("voice"), Some(TrackKind::Voice));
        assert_eq!(TrackKind::parse("noise"), None);
    }
}
