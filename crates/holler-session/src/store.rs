//! File-backed persistence for the guest session pair.
//!
//! The store is a single JSON document of named string slots, the
//! client-side equivalent of the browser's local storage: values survive
//! restarts and disappear only on explicit removal. Writes go through a
//! sibling temp file followed by a rename, so the document is replaced
//! atomically and a crash mid-write cannot half-persist the pair.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;

use crate::error::StoreError;

const SESSION_FILE: &str = "session.json";

/// Named string slots persisted as one JSON document on disk.
pub struct SessionStore {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, String>>,
}

impl SessionStore {
    /// Open (or create) the default session store.
    ///
    /// The file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/holler/session.json`
    /// - macOS:   `~/Library/Application Support/com.holler.holler/session.json`
    /// - Windows: `{FOLDERID_RoamingAppData}\holler\holler\data\session.json`
    pub fn open_default() -> Result<Self, StoreError> {
        let project_dirs =
            ProjectDirs::from("com", "holler", "holler").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let path = data_dir.join(SESSION_FILE);

        tracing::info!(path = %path.display(), "opening session store");

        Self::open_at(&path)
    }

    /// Open (or create) a session store at an explicit path.
    ///
    /// This is useful for tests and for embedding the store inside custom
    /// directory layouts.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let slots = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            slots: Mutex::new(slots),
        })
    }

    /// Read a slot. Absence is not an error.
    pub fn get(&self, slot: &str) -> Option<String> {
        match self.slots.lock() {
            Ok(guard) => guard.get(slot).cloned(),
            Err(poisoned) => poisoned.into_inner().get(slot).cloned(),
        }
    }

    /// Write a slot and flush the document to disk.
    pub fn set(&self, slot: &str, value: &str) -> Result<(), StoreError> {
        let mut guard = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(slot.to_string(), value.to_string());
        self.flush(&guard)
    }

    /// Remove a slot and flush. Removing an absent slot is a no-op.
    pub fn remove(&self, slot: &str) -> Result<(), StoreError> {
        let mut guard = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.remove(slot).is_none() {
            return Ok(());
        }
        self.flush(&guard)
    }

    fn flush(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(slots)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
