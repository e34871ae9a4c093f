//! Durable key-value persistence for history, favorites and preferences.

use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};

use crate::error::StorageError;

pub const HISTORY_KEY: &str = "searchHistory";
pub const FAVORITES_KEY: &str = "favorites";
pub const THEME_KEY: &str = "theme";
pub const UNIT_KEY: &str = "unit";

/// String key-value store. Writes are synchronous and durable on return.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys in one JSON object file, rewritten in full on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the file at `path`. A missing or empty file starts empty.
    ///
    /// A file that does not parse is moved aside to `<name>.bak` and the store
    /// starts empty, so one bad write cannot lock the user out.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            parse_entries(&path, &contents)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened state file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Write `entries` to a sibling temp file, then rename it over the target.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = sibling(&self.path, "tmp");

        fs::write(&tmp, json).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            io_error(&self.path, source)
        })
    }
}

fn parse_entries(path: &Path, contents: &str) -> Result<BTreeMap<String, String>, StorageError> {
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    match serde_json::from_str(contents) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            let backup = sibling(path, "bak");
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "State file is corrupt; starting empty"
            );
            fs::rename(path, &backup).map_err(|source| io_error(path, source))?;
            Ok(BTreeMap::new())
        }
    }
}

/// `state.json` -> `state.json.<ext>`
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();

        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;

        *entries = next;
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
