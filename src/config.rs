use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from stoker.toml.
///
/// The file is optional; a missing file means pure defaults, and every
/// section and key may be omitted individually.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub heartbeat: HeartbeatConfig,
    pub confirm: ConfirmConfig,
    pub reload: ReloadConfig,
    pub page: PageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    pub startup_delay_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConfirmConfig {
    pub poll_count: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub guard_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub cdp_url: String,
    pub url_fragment: String,
}

// --- Default implementations ---

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            startup_delay_secs: 15,
        }
    }
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_count: 6,
            poll_interval_ms: 1500,
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { guard_secs: 600 }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            cdp_url: "ws://127.0.0.1:9222".to_string(),
            url_fragment: String::new(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

impl ConfirmConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReloadConfig {
    pub fn guard_window(&self) -> Duration {
        Duration::from_secs(self.guard_secs)
    }
}

/// Errors loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load configuration from `path`.
///
/// A missing file yields defaults; an unreadable or malformed file is
/// a startup error.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
