//! Key-value persistence for learning-state snapshots.
//!
//! The session never touches storage directly; it is handed a
//! [`KeyValueStore`] at bootstrap. Snapshots are opaque text to the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TutorError};
use crate::learning_state::LearningState;

/// A string-keyed snapshot store.
pub trait KeyValueStore: Send {
    /// Returns the value stored under `key`, or `None` if there is none.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Loads the learning state stored under `key`.
///
/// A missing key yields the default state; so does a corrupt snapshot.
///
/// # Errors
///
/// Returns an error only if the store itself cannot be read.
pub fn load_state(store: &dyn KeyValueStore, key: &str) -> Result<LearningState> {
    match store.get(key)? {
        Some(text) => Ok(LearningState::from_snapshot(&text)),
        None => {
            debug!(key, "No stored learning state, starting fresh");
            Ok(LearningState::default())
        }
    }
}

/// Serializes `state` and stores it under `key`.
///
/// # Errors
///
/// Returns an error if serialization or the store write fails.
pub fn save_state(store: &mut dyn KeyValueStore, key: &str, state: &LearningState) -> Result<()> {
    let text = state.to_snapshot()?;
    store.set(key, &text)
}

// ============================================================================
// MemoryStore
// ============================================================================

/// An in-memory store, for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self { entries }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// A store keeping one `<key>.json` file per key in a directory.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if `key` is empty or contains a path separator.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(TutorError::storage(key, "key must be a plain file name"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TutorError::storage(
                key,
                format!("failed to read {}: {e}", path.display()),
            )),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            TutorError::storage(
                key,
                format!("failed to create {}: {e}", self.dir.display()),
            )
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| {
            TutorError::storage(key, format!("failed to write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            TutorError::storage(key, format!("failed to replace {}: {e}", path.display()))
        })?;

        debug!(key, path = %path.display(), bytes = value.len(), "Snapshot written");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(key, path = %path.display(), "Snapshot removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TutorError::storage(
                key,
                format!("failed to remove {}: {e}", path.display()),
            )),
        }
    }
}
