//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory name used under the OS configuration directory.
pub const APP_NAME: &str = "voxmerge";

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Merge settings.
    pub merge: MergeConfig,
    /// Logging settings.
    pub debug: DebugConfig,
}

/// Merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    /// Keep relocated colors inside their material band.
    pub preserve_material_category: bool,
    /// File the merged container is written to.
    pub output: PathBuf,
    /// Version written into the output header.
    pub format_version: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level filter (e.g., "debug", "info", "voxmerge_vox=trace").
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub file_logging: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            preserve_material_category: true,
            output: PathBuf::from("output.vox"),
            format_version: 200,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// `<OS config dir>/voxmerge`, if the OS exposes a config directory.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// The explicit `--config` directory, or [`default_config_dir`].
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => default_config_dir().ok_or(ConfigError::NoConfigDir),
    }
}

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// if the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
                log::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(config_dir)?;
                log::info!("Wrote default config to {}", path.display());
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadError(e)),
        }
    }

    /// Writes `config.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .enumerate_arrays(false);
        let text = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::create_dir_all(config_dir)
            .and_then(|()| std::fs::write(config_dir.join(CONFIG_FILE), text))
            .map_err(ConfigError::WriteError)
    }
}
