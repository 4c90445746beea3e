//! Persisted settings (sizes, feedback timing, clipboard commands) in the
//! platform config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::{SizePolicy, LIST_SIZE, MAX_ENLARGED_SIZE};
use crate::error::ConfigError;

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of list codes, in pixels.
    pub list_size: f64,
    /// Cap of the enlarged code, in pixels.
    pub max_enlarged_size: f64,
    /// How long action feedback stays visible.
    pub feedback_millis: u64,
    /// Where downloads go. Defaults to the current directory.
    pub download_dir: Option<PathBuf>,
    pub clipboard: ClipboardConfig,
}

/// External programs used as the clipboard. The payload is piped to stdin;
/// `{mime}` in the image command is replaced with the MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    pub text_command: Vec<String>,
    pub image_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_size: LIST_SIZE,
            max_enlarged_size: MAX_ENLARGED_SIZE,
            feedback_millis: 1500,
            download_dir: None,
            clipboard: ClipboardConfig::default(),
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            text_command: vec!["wl-copy".to_string()],
            image_command: Some(vec!["wl-copy".to_string(), "--type".to_string(), "{mime}".to_string()]),
        }
    }
}

impl Config {
    pub fn size_policy(&self) -> SizePolicy {
        SizePolicy {
            list_size: self.list_size,
            max_enlarged_size: self.max_enlarged_size,
        }
    }

    pub fn feedback_duration(&self) -> Duration {
        Duration::from_millis(self.feedback_millis)
    }
}

/// Directory holding `config.toml`, or `None` if it cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("app", "qrbatch", "qrbatch").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load config. Returns the default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    parse_config(&s)
}

/// Parses config text; anything invalid yields the default config.
pub fn parse_config(s: &str) -> Config {
    match toml::from_str(s) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "invalid config, using defaults");
            Config::default()
        }
    }
}

/// Save config to the config directory, creating it if needed.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    write_config(config, &path)?;
    Ok(path)
}

/// Writes `config` as TOML to `path`, creating parent directories.
pub fn write_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(ConfigError::Write)?;
    }
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}
