// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving session timeouts and options.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default connection timeout in milliseconds.
pub const CONNECT_TIMEOUT_DEFAULT_MS: u64 = 20_000;

/// Default write timeout in milliseconds.
pub const WRITE_TIMEOUT_DEFAULT_MS: u64 = 1_500;

/// Default first read/notify timeout in milliseconds.
pub const FIRST_READ_TIMEOUT_DEFAULT_MS: u64 = 2_000;

/// Default later read/notify (quiet period) timeout in milliseconds.
pub const LATER_READ_TIMEOUT_DEFAULT_MS: u64 = 200;

/// Timeouts governing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Time allowed for the link to come up.
    pub connect_ms: u64,
    /// Time allowed for each packet (and each mode value) to be confirmed.
    pub write_ms: u64,
    /// Time allowed after a write for the first read or notify fragment.
    pub first_read_ms: u64,
    /// Silence after which an inbound message is considered complete.
    pub later_read_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: CONNECT_TIMEOUT_DEFAULT_MS,
            write_ms: WRITE_TIMEOUT_DEFAULT_MS,
            first_read_ms: FIRST_READ_TIMEOUT_DEFAULT_MS,
            later_read_ms: LATER_READ_TIMEOUT_DEFAULT_MS,
        }
    }
}

impl Timeouts {
    pub fn new(connect_ms: u64, write_ms: u64, first_read_ms: u64, later_read_ms: u64) -> Self {
        Self {
            connect_ms,
            write_ms,
            first_read_ms,
            later_read_ms,
        }
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn first_read(&self) -> Duration {
        Duration::from_millis(self.first_read_ms)
    }

    pub fn later_read(&self) -> Duration {
        Duration::from_millis(self.later_read_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Record write/notify timing and deliver it after each answered write.
    pub record_timestamps: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_timestamps: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session timeouts.
    pub timeouts: Timeouts,

    /// Session options.
    pub session: SessionConfig,
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("txrx-ble")
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing the defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect(), Duration::from_secs(20));
        assert_eq!(timeouts.write(), Duration::from_millis(1500));
        assert_eq!(timeouts.first_read(), Duration::from_secs(2));
        assert_eq!(timeouts.later_read(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str("[timeouts]\nlater_read_ms = 50\n").unwrap();
        assert_eq!(config.timeouts.later_read_ms, 50);
        assert_eq!(config.timeouts.connect_ms, CONNECT_TIMEOUT_DEFAULT_MS);
        assert!(config.session.record_timestamps);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.timeouts = Timeouts::new(5_000, 800, 1_000, 120);
        config.session.record_timestamps = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timeouts, Timeouts::new(5_000, 800, 1_000, 120));
        assert!(!loaded.session.record_timestamps);
    }
}
