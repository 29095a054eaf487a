//! Engine configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/swatch-order/config.json`, created with
//! defaults on first run, then overridden from the environment and clamped
//! to safe ranges.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bridge key holding the color tokens
    #[serde(default = "default_setting_key")]
    pub setting_key: String,

    /// Minimum time between two resets
    #[serde(default = "default_reset_cooldown_ms")]
    pub reset_cooldown_ms: u64,

    /// Delay between a commit and the re-verification pass
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Settings store used by the file bridge (defaults next to the config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,
}

fn default_setting_key() -> String {
    constants::bridge::SETTING_KEY.to_string()
}

fn default_reset_cooldown_ms() -> u64 {
    constants::timing::RESET_COOLDOWN_MS
}

fn default_settle_delay_ms() -> u64 {
    constants::timing::SETTLE_DELAY_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            setting_key: default_setting_key(),
            reset_cooldown_ms: default_reset_cooldown_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            settings_file: None,
        }
    }
}

impl EngineConfig {
    fn app_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path
    }

    pub fn path() -> PathBuf {
        Self::app_dir().join(constants::config::FILENAME)
    }

    pub fn reset_cooldown(&self) -> Duration {
        Duration::from_millis(self.reset_cooldown_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Settings store location (explicit override or the default file)
    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| Self::app_dir().join(constants::config::SETTINGS_FILENAME))
    }

    /// Load from the default location, creating it when missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            serde_json::from_str::<EngineConfig>(&contents)
                .with_context(|| format!("Failed to parse config JSON from {:?}", path))?
        } else {
            info!(path = %path.display(), "Config file not found, creating default config");
            let config = EngineConfig::default();
            config.save_to(path)?;
            config
        };

        config.apply_env_overrides();
        config.validate_and_clamp();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T>
    where
        <T as std::str::FromStr>::Err: std::fmt::Debug,
    {
        let raw = env::var(var).ok()?;
        raw.trim()
            .parse::<T>()
            .inspect_err(|e| error!(var = %var, error = ?e, "failed to parse env var"))
            .ok()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var("SWATCH_ORDER_SETTINGS") {
            self.settings_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = Self::parse_env("SWATCH_ORDER_RESET_COOLDOWN_MS") {
            self.reset_cooldown_ms = ms;
        }
        if let Some(ms) = Self::parse_env("SWATCH_ORDER_SETTLE_DELAY_MS") {
            self.settle_delay_ms = ms;
        }
    }

    /// Keep timings inside ranges the engine can live with
    fn validate_and_clamp(&mut self) {
        use constants::config::{MAX_DELAY_MS, MIN_RESET_COOLDOWN_MS};

        if self.setting_key.trim().is_empty() {
            warn!(using = %default_setting_key(), "setting_key is empty, using default");
            self.setting_key = default_setting_key();
        }

        // A zero cooldown would let an inconsistent store drive a tight reset loop
        if self.reset_cooldown_ms < MIN_RESET_COOLDOWN_MS {
            warn!(reset_cooldown_ms = self.reset_cooldown_ms, min = MIN_RESET_COOLDOWN_MS, "reset_cooldown_ms below minimum, clamping");
            self.reset_cooldown_ms = MIN_RESET_COOLDOWN_MS;
        } else if self.reset_cooldown_ms > MAX_DELAY_MS {
            warn!(reset_cooldown_ms = self.reset_cooldown_ms, max = MAX_DELAY_MS, "reset_cooldown_ms exceeds maximum, clamping");
            self.reset_cooldown_ms = MAX_DELAY_MS;
        }

        if self.settle_delay_ms > MAX_DELAY_MS {
            warn!(settle_delay_ms = self.settle_delay_ms, max = MAX_DELAY_MS, "settle_delay_ms exceeds maximum, clamping");
            self.settle_delay_ms = MAX_DELAY_MS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = EngineConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.setting_key, "color_tokens_user");
        assert_eq!(config.settle_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "settle_delay_ms": 50 }"#).unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.settle_delay_ms, 50);
        assert_eq!(config.reset_cooldown_ms, 500);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(EngineConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_and_clamp() {
        let mut config = EngineConfig {
            setting_key: "  ".to_string(),
            reset_cooldown_ms: 0,
            settle_delay_ms: 1_000_000,
            settings_file: None,
        };
        config.validate_and_clamp();

        assert_eq!(config.setting_key, "color_tokens_user");
        assert_eq!(config.reset_cooldown_ms, constants::config::MIN_RESET_COOLDOWN_MS);
        assert_eq!(config.settle_delay_ms, constants::config::MAX_DELAY_MS);
    }

    #[test]
    fn test_settings_path_override() {
        let config = EngineConfig {
            settings_file: Some(PathBuf::from("/tmp/tokens.json")),
            ..EngineConfig::default()
        };
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/tokens.json"));
    }
}
