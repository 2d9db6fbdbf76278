//! Persisted session snapshot.
//!
//! The store saves the user slice after every dispatch and rehydrates it on
//! startup, so a reload shows the last known session until the auth backend
//! reports otherwise. Only the session is persisted; sync errors are
//! transient.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::session::Session;
use crate::store::StoreState;

/// Snapshot written by `StatePersistence::save`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub current_user: Option<Session>,
}

impl From<&StoreState> for PersistedSession {
    fn from(state: &StoreState) -> Self {
        Self {
            current_user: state.user.current_user.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Backing storage for the session snapshot
pub trait StatePersistence: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    fn load(&self) -> Result<Option<PersistedSession>, PersistError>;

    fn save(&self, state: &StoreState) -> Result<(), PersistError>;
}

/// JSON file on disk
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl StatePersistence for JsonFilePersistence {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<PersistedSession>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, state: &StoreState) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&PersistedSession::from(state))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory snapshot, for tests and targets without storage
#[derive(Default)]
pub struct MemoryPersistence {
    snapshot: Mutex<Option<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON of the last save
    pub fn raw(&self) -> Option<String> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatePersistence for MemoryPersistence {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Option<PersistedSession>, PersistError> {
        match self.raw() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &StoreState) -> Result<(), PersistError> {
        let raw = serde_json::to_string(&PersistedSession::from(state))?;
        *self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

/// Browser localStorage under a fixed key
#[cfg(target_arch = "wasm32")]
pub struct LocalStoragePersistence {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl LocalStoragePersistence {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Result<web_sys::Storage, PersistError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or_else(|| PersistError::Unavailable("localStorage".into()))
    }
}

#[cfg(target_arch = "wasm32")]
impl StatePersistence for LocalStoragePersistence {
    fn name(&self) -> &'static str {
        "localStorage"
    }

    fn load(&self) -> Result<Option<PersistedSession>, PersistError> {
        let raw = Self::storage()?
            .get_item(&self.key)
            .map_err(|e| PersistError::Unavailable(format!("{:?}", e)))?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &StoreState) -> Result<(), PersistError> {
        let raw = serde_json::to_string(&PersistedSession::from(state))?;
        Self::storage()?
            .set_item(&self.key, &raw)
            .map_err(|e| PersistError::Unavailable(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Action, Store};
    use std::sync::Arc;

    #[test]
    fn test_file_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        let store = Store::with_persistence(Arc::new(JsonFilePersistence::new(&path)));
        store.dispatch(Action::SetCurrentUser(Session::new("u1").with_email("a@b.c")));
        assert!(path.exists());

        let reloaded = Store::with_persistence(Arc::new(JsonFilePersistence::new(&path)));
        let user = reloaded.get_state().user.current_user.clone().unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let p = JsonFilePersistence::new(dir.path().join("absent.json"));
        assert!(p.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_starts_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = Store::with_persistence(Arc::new(JsonFilePersistence::new(&path)));
        assert!(store.get_state().user.current_user.is_none());
    }

    #[test]
    fn test_sync_error_is_not_persisted() {
        let mem = Arc::new(MemoryPersistence::new());
        let store = Store::with_persistence(mem.clone());
        store.dispatch(Action::SessionSyncFailed(crate::session::SyncFailure::now("x")));

        let raw = mem.raw().unwrap();
        assert!(!raw.contains("\"x\""));
        assert_eq!(mem.load().unwrap(), Some(PersistedSession::default()));
    }
}
