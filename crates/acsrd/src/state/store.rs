//! Durable storage for the alarm state.
//!
//! The actor loads once at startup and saves after every applied
//! transition. Saves run on the blocking thread pool, one at a time, so a
//! store may do synchronous file I/O freely.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use acsr_core::{AlarmState, PersistedState};
use thiserror::Error;
use tracing::debug;

/// Errors raised by a state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state encoding: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the persisted alarm state.
pub trait StateStore: Send + Sync + 'static {
    /// Returns the stored state, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<AlarmState>, StoreError>;

    /// Durably records `state`.
    fn save(&self, state: AlarmState) -> Result<(), StoreError>;
}

/// Stores the state as a small JSON document on disk.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so a crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<AlarmState>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let persisted: PersistedState = serde_json::from_str(&text)?;
        Ok(Some(persisted.into()))
    }

    fn save(&self, state: AlarmState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_vec(&PersistedState::from(state))?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), state = %state, "State saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<AlarmState>,
    history: Vec<AlarmState>,
    fail_saves: bool,
}

/// In-memory store; clones share the same contents.
///
/// Keeps every saved state in order and can be told to fail saves, which
/// makes it the store of choice for exercising the actor.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `state`.
    pub fn with_state(state: AlarmState) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.state = Some(state);
        }
        store
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_saves = fail;
        }
    }

    /// Last successfully saved (or seeded) state.
    pub fn stored(&self) -> Option<AlarmState> {
        self.inner.lock().ok().and_then(|inner| inner.state)
    }

    /// Every successfully saved state, oldest first.
    pub fn history(&self) -> Vec<AlarmState> {
        self.inner
            .lock()
            .map(|inner| inner.history.clone())
            .unwrap_or_default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<AlarmState>, StoreError> {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn save(&self, state: AlarmState) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        if inner.fail_saves {
            return Err(StoreError::Unavailable("save rejected".to_string()));
        }

        inner.state = Some(state);
        inner.history.push(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acsr_core::Provenance;

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileStore::new(&path);

        store.save(AlarmState::Armed(Provenance::Auto)).unwrap();
        assert_eq!(
            JsonFileStore::new(&path).load().unwrap(),
            Some(AlarmState::Armed(Provenance::Auto))
        );

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"armed":true,"provenance":"auto"}"#);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "armed").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(StoreError::Serialize(_))
        ));
    }

    #[test]
    fn test_file_store_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = JsonFileStore::new(blocker.join("state.json"));
        assert!(matches!(
            store.save(AlarmState::Disarmed),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn test_memory_store_failure_keeps_previous() {
        let store = MemoryStore::with_state(AlarmState::Disarmed);
        store.set_fail_saves(true);
        assert!(store.save(AlarmState::Armed(Provenance::Manual)).is_err());
        assert_eq!(store.stored(), Some(AlarmState::Disarmed));
        assert!(store.history().is_empty());
    }
}
