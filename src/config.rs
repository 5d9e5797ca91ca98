//! Configuration module for the notepad synchronizer.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `NOTEPAD_` and use double underscores
//! to separate nested levels:
//! - `NOTEPAD_NOTEPAD__FOLDER_NAME=journal` sets `notepad.folder_name`
//! - `NOTEPAD_NOTEPAD__FILE_EXTENSION=txt` sets `notepad.file_extension`
//! - `NOTEPAD_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file, relative to the workspace.
pub const CONFIG_DIR: &str = ".notepad";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace roots to track when none are given on the command line
    #[serde(default)]
    pub workspace_roots: Vec<PathBuf>,

    /// Notepad folder and note file settings
    #[serde(default)]
    pub notepad: NotepadConfig,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct NotepadConfig {
    /// Directory name, relative to each workspace root, holding notes
    #[serde(default = "default_folder_name")]
    pub folder_name: String,

    /// Extension of note files; a leading `.` is optional
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// chrono format string used to prefix new note file names
    #[serde(default = "default_prefix_format")]
    pub prefix_format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for every module
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `notepad_sync::sync = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_folder_name() -> String {
    ".notepad".to_string()
}
fn default_file_extension() -> String {
    ".md".to_string()
}
fn default_prefix_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_roots: Vec::new(),
            notepad: NotepadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NotepadConfig {
    fn default() -> Self {
        Self {
            folder_name: default_folder_name(),
            file_extension: default_file_extension(),
            prefix_format: default_prefix_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl NotepadConfig {
    /// Note file extension, always starting with `.`.
    pub fn extension(&self) -> String {
        if self.file_extension.starts_with('.') {
            self.file_extension.clone()
        } else {
            format!(".{}", self.file_extension)
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref().to_path_buf())
            .extract()
            .map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels
            .merge(Env::prefixed("NOTEPAD_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the settings file by looking for a `.notepad` directory
    /// from the current directory up to the filesystem root.
    ///
    /// A `.notepad` directory only counts when it holds `settings.toml`, since
    /// the default notepad folder shares the name.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR).join("settings.toml"))
            .find(|candidate| candidate.is_file())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `base` (empty for the current directory)
    pub fn init_config_file(
        base: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = base.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err(format!(
                "Configuration file already exists at: {}. Use --force to overwrite",
                config_path.display()
            )
            .into());
        }

        Settings::default().save(&config_path)?;

        Ok(config_path)
    }
}

/// Source of notepad settings for the synchronizer.
///
/// Read on every operation rather than cached, so a changed folder name or
/// extension applies on the next event or `setup()`.
pub trait ConfigSource: Send + Sync {
    fn notepad(&self) -> NotepadConfig;
}

/// Hot-swappable [`ConfigSource`].
#[derive(Debug, Default)]
pub struct SharedConfig {
    inner: RwLock<NotepadConfig>,
}

impl SharedConfig {
    pub fn new(config: NotepadConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Swap in new settings. Takes effect on the next read.
    pub fn replace(&self, config: NotepadConfig) {
        *self.inner.write() = config;
    }
}

impl ConfigSource for SharedConfig {
    fn notepad(&self) -> NotepadConfig {
        self.inner.read().clone()
    }
}

impl ConfigSource for NotepadConfig {
    fn notepad(&self) -> NotepadConfig {
        self.clone()
    }
}
