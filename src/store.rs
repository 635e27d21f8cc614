//! Persisted settings
//!
//! Storage is a flat key/value object: numeric-string keys hold custom
//! names, and two reserved keys hold the dark-mode flag and the palette.

use crate::sync::NameOverrideMap;
use crate::theme::ThemePalette;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Reserved key for the dark-mode flag
pub const DARK_MODE_KEY: &str = "darkMode";
/// Reserved key for the palette object
pub const THEME_KEY: &str = "themeColors";

/// Whether `key` is a name entry (non-empty, digits only)
pub fn is_name_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

pub trait StateStore {
    /// Every stored entry
    fn entries(&self) -> Result<Map<String, Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Store kept in memory, for tests and short-lived sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
}

impl StateStore for MemoryStore {
    fn entries(&self) -> Result<Map<String, Value>> {
        Ok(self.entries.clone())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// A missing file reads as empty; every write rewrites the whole file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<()> {
        let text = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn entries(&self) -> Result<Map<String, Value>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Storage(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.entries()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Settings as read from a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub names: NameOverrideMap,
    pub dark_mode: bool,
    pub palette: ThemePalette,
}

impl PersistedState {
    pub fn load<S: StateStore + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self::from_entries(&store.entries()?))
    }

    /// Interpret raw entries. Unknown keys are ignored; a stored palette that
    /// no longer validates falls back to the built-in default.
    pub fn from_entries(entries: &Map<String, Value>) -> Self {
        let mut state = Self::default();
        for (key, value) in entries {
            if is_name_key(key) {
                if let Some(name) = value.as_str() {
                    state.names.set(key, name);
                }
            }
        }
        state.dark_mode = entries
            .get(DARK_MODE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(raw) = entries.get(THEME_KEY) {
            match serde_json::from_value::<ThemePalette>(raw.clone()) {
                Ok(palette) => state.palette = palette,
                Err(e) => log::warn!("ignoring stored palette: {}", e),
            }
        }
        state
    }
}
