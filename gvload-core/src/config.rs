//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gvload/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gvload/` (~/.config/gvload/)
//! - Data: `$XDG_DATA_HOME/gvload/` (~/.local/share/gvload/)
//! - State/Logs: `$XDG_STATE_HOME/gvload/` (~/.local/state/gvload/)
//!
//! Every value can be overridden on the command line.

use crate::error::{Error, Result};
use crate::ingest::{DEFAULT_EXTENSION, DEFAULT_PROGRESS_EVERY};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// The account owner's phone numbers
    #[serde(default)]
    pub account: AccountConfig,

    /// Page discovery settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Account owner identity
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AccountConfig {
    /// Phone numbers of this account; the first is the primary number
    #[serde(default)]
    pub my_numbers: Vec<String>,
}

impl AccountConfig {
    /// Numbers reduced to their digits, blanks dropped.
    ///
    /// Pages identify parties by the digits of a `tel:` link, so
    /// `+1 (555) 000-1111` and `15550001111` are the same number.
    pub fn normalized_numbers(&self) -> Vec<String> {
        self.my_numbers
            .iter()
            .map(|n| n.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|n| !n.is_empty())
            .collect()
    }

    /// At least one usable number is required.
    pub fn validate(&self) -> Result<()> {
        if self.normalized_numbers().is_empty() {
            return Err(Error::Config(
                "account.my_numbers must list at least one phone number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Page discovery settings
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Extension of export pages
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Log a progress line every N files
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_progress_every() -> usize {
    DEFAULT_PROGRESS_EVERY
}

/// Output locations
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Database file; defaults to [`Config::database_path`]
    pub database: Option<PathBuf>,

    /// Where resolved contacts are exported
    #[serde(default = "default_contacts_csv")]
    pub contacts_csv: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database: None,
            contacts_csv: default_contacts_csv(),
        }
    }
}

fn default_contacts_csv() -> PathBuf {
    PathBuf::from("contacts.csv")
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Database file to use when none is given explicitly
    pub fn resolved_database(&self) -> PathBuf {
        self.output
            .database
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gvload/config.toml` (~/.config/gvload/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gvload").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/gvload/` (~/.local/share/gvload/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("gvload")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gvload/` (~/.local/state/gvload/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gvload")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/gvload/gvload.db` (~/.local/share/gvload/gvload.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("gvload.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gvload/gvload.log` (~/.local/state/gvload/gvload.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gvload.log")
    }
}
