// FavoritesStore: persisted set of favorited ambient sound ids
//
// The set is stored as a JSON list under a single preference key. Storage
// problems never reach the caller: unreadable data loads as an empty set and
// a failed write leaves the in-memory set authoritative.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{log_storage_error, StorageError};
use crate::preferences::PreferenceStore;

pub const FAVORITES_KEY: &str = "calmease:favorites";

pub struct FavoritesStore {
    store: Arc<dyn PreferenceStore>,
    /// Insertion-ordered, no duplicates
    ids: Mutex<Vec<String>>,
}

impl FavoritesStore {
    /// Load the persisted set once.
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let ids = match read_ids(store.as_ref()) {
            Ok(ids) => ids,
            Err(err) => {
                log_storage_error(&err, "favorites_load");
                Vec::new()
            }
        };
        log::debug!("[Favorites] loaded {} ids", ids.len());

        Self {
            store,
            ids: Mutex::new(ids),
        }
    }

    /// Flip membership of `id` and persist the full set
    ///
    /// # Returns
    /// `true` if `id` is a favorite afterwards
    pub fn toggle(&self, id: &str) -> bool {
        let mut ids = self.guard();
        let now_favorite = match ids.iter().position(|existing| existing == id) {
            Some(index) => {
                ids.remove(index);
                false
            }
            None => {
                ids.push(id.to_string());
                true
            }
        };

        if let Err(err) = self.persist(&ids) {
            log_storage_error(&err, "favorites_toggle");
        }
        now_favorite
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.guard().iter().any(|existing| existing == id)
    }

    /// Favorited ids in the order they were added.
    pub fn ids(&self) -> Vec<String> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn persist(&self, ids: &[String]) -> Result<(), StorageError> {
        let json = serde_json::to_string(ids).map_err(|e| StorageError::Io {
            details: e.to_string(),
        })?;
        self.store.set(FAVORITES_KEY, &json)
    }

    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_ids(store: &dyn PreferenceStore) -> Result<Vec<String>, StorageError> {
    let Some(raw) = store.get(FAVORITES_KEY)? else {
        return Ok(Vec::new());
    };

    let parsed: Vec<String> = serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
        key: FAVORITES_KEY.to_string(),
        reason: e.to_string(),
    })?;

    let mut ids: Vec<String> = Vec::with_capacity(parsed.len());
    for id in parsed {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferenceStore;

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable {
                reason: "quota exceeded".to_string(),
            })
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable {
                reason: "quota exceeded".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let favorites = FavoritesStore::load(Arc::new(MemoryPreferenceStore::new()));
        assert!(favorites.toggle("ocean-waves"));
        assert!(favorites.is_favorite("ocean-waves"));
        assert!(!favorites.toggle("ocean-waves"));
        assert!(!favorites.is_favorite("ocean-waves"));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_reload_yields_same_set() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let favorites = FavoritesStore::load(Arc::clone(&store));
        favorites.toggle("gentle-rain");
        favorites.toggle("night-crickets");
        favorites.toggle("thunderstorm");
        favorites.toggle("night-crickets");

        let reloaded = FavoritesStore::load(store);
        assert_eq!(reloaded.ids(), vec!["gentle-rain", "thunderstorm"]);
    }

    #[test]
    fn test_persisted_as_json_list() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let favorites = FavoritesStore::load(store.clone());
        favorites.toggle("rain");
        assert_eq!(
            store.get(FAVORITES_KEY).unwrap().as_deref(),
            Some(r#"["rain"]"#)
        );
    }

    #[test]
    fn test_corrupt_data_loads_empty() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store.set(FAVORITES_KEY, "{\"oops\": true}").unwrap();
        let favorites = FavoritesStore::load(store);
        assert!(favorites.is_empty());
        assert!(favorites.toggle("forest"));
    }

    #[test]
    fn test_duplicates_collapse_on_load() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store.set(FAVORITES_KEY, r#"["a","b","a"]"#).unwrap();
        let favorites = FavoritesStore::load(store);
        assert_eq!(favorites.len(), 2);
    }

    #[test]
    fn test_unavailable_storage_keeps_memory_set() {
        let favorites = FavoritesStore::load(Arc::new(BrokenStore));
        assert!(favorites.is_empty());
        assert!(favorites.toggle("ocean"));
        assert!(favorites.is_favorite("ocean"));
    }
}
