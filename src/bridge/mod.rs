//! Config bridge: the host-owned settings store
//!
//! The engine never talks to a store directly. It emits [`EngineSignal`]s which
//! the relay answers through a [`ConfigBridge`] implementation.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

use crate::token::TokenSettings;

mod messages;
pub mod relay;
pub use messages::{BridgeSignal, EngineSignal};

/// Host settings store
///
/// No transactional guarantee beyond "last write wins".
pub trait ConfigBridge {
    /// Full current value for `key` (empty settings when never written)
    fn get_setting(&mut self, key: &str) -> Result<TokenSettings>;

    /// Replace the value for `key`; `persist = false` keeps it for this session only
    fn set_setting(&mut self, persist: bool, key: &str, value: &TokenSettings) -> Result<()>;
}

/// Settings store backed by a JSON file mapping keys to values
pub struct FileBridge {
    path: PathBuf,
    session: HashMap<String, TokenSettings>,
}

impl FileBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            session: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {:?}", self.path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings JSON from {:?}", self.path))
    }
}

impl ConfigBridge for FileBridge {
    fn get_setting(&mut self, key: &str) -> Result<TokenSettings> {
        if let Some(value) = self.session.get(key) {
            return Ok(value.clone());
        }
        match self.read_all()?.remove(key) {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Setting '{key}' is not a token map")),
            None => {
                debug!(key, path = %self.path.display(), "Setting not present, using empty map");
                Ok(TokenSettings::default())
            }
        }
    }

    fn set_setting(&mut self, persist: bool, key: &str, value: &TokenSettings) -> Result<()> {
        if !persist {
            self.session.insert(key.to_string(), value.clone());
            return Ok(());
        }
        self.session.remove(key);

        // Other keys in the file belong to the host and are written back untouched
        let mut all = self.read_all()?;
        all.insert(
            key.to_string(),
            serde_json::to_value(value).context("Failed to serialize token settings")?,
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&all).context("Failed to serialize settings file")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {:?}", self.path))?;
        info!(key, path = %self.path.display(), "Saved setting");
        Ok(())
    }
}

/// A write observed by [`MemoryBridge`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub persist: bool,
    pub key: String,
    pub value: TokenSettings,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, TokenSettings>,
    reads: usize,
    writes: Vec<RecordedWrite>,
}

/// In-process settings store; clones share the same data
///
/// Counts reads and records every write so callers can observe the round trips
/// the engine caused.
#[derive(Debug, Clone, Default)]
pub struct MemoryBridge {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(key: &str, value: TokenSettings) -> Self {
        let bridge = Self::new();
        bridge.state.borrow_mut().values.insert(key.to_string(), value);
        bridge
    }

    /// Replace a value behind the engine's back (host-side edit)
    pub fn put(&self, key: &str, value: TokenSettings) {
        self.state.borrow_mut().values.insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<TokenSettings> {
        self.state.borrow().values.get(key).cloned()
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.borrow().writes.clone()
    }
}

impl ConfigBridge for MemoryBridge {
    fn get_setting(&mut self, key: &str) -> Result<TokenSettings> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        Ok(state.values.get(key).cloned().unwrap_or_default())
    }

    fn set_setting(&mut self, persist: bool, key: &str, value: &TokenSettings) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.values.insert(key.to_string(), value.clone());
        state.writes.push(RecordedWrite {
            persist,
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ColorToken, TokenId};

    fn settings() -> TokenSettings {
        [
            (TokenId::from("a"), ColorToken::new(0, "rgba(1,2,3,1)")),
            (TokenId::from("b"), ColorToken::new(1, "rgba(4,5,6,1)")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_file_bridge_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = FileBridge::new(dir.path().join("settings.json"));
        assert_eq!(bridge.get_setting("color_tokens_user").unwrap(), TokenSettings::default());
    }

    #[test]
    fn test_file_bridge_persists_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "font_tokens": { "default": {} }, "theme": "dark" }"#).unwrap();

        let mut bridge = FileBridge::new(&path);
        bridge.set_setting(true, "color_tokens_user", &settings()).unwrap();

        let mut reopened = FileBridge::new(&path);
        assert_eq!(reopened.get_setting("color_tokens_user").unwrap(), settings());

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn test_file_bridge_session_write_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut bridge = FileBridge::new(&path);
        bridge.set_setting(false, "color_tokens_user", &settings()).unwrap();
        assert_eq!(bridge.get_setting("color_tokens_user").unwrap(), settings());
        assert!(!path.exists());
    }

    #[test]
    fn test_file_bridge_rejects_malformed_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "color_tokens_user": 42 }"#).unwrap();

        let mut bridge = FileBridge::new(&path);
        assert!(bridge.get_setting("color_tokens_user").is_err());
    }

    #[test]
    fn test_memory_bridge_records_round_trips() {
        let mut bridge = MemoryBridge::with_setting("k", settings());
        let observer = bridge.clone();

        assert_eq!(bridge.get_setting("k").unwrap(), settings());
        bridge.set_setting(true, "k", &TokenSettings::default()).unwrap();

        assert_eq!(observer.reads(), 1);
        assert_eq!(observer.writes().len(), 1);
        assert_eq!(observer.value("k"), Some(TokenSettings::default()));
    }
}
