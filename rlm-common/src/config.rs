//! Configuration loading and database path resolution
//!
//! Database path priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`RLM_DATABASE`)
//! 3. TOML config file (`RLM_CONFIG`, else `~/.config/rlm/config.toml`,
//!    else `/etc/rlm/config.toml` on Linux)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: it is logged and
//! compiled defaults are used.

use crate::validator::DEFAULT_SHARE_TOLERANCE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the database file
pub const DATABASE_ENV: &str = "RLM_DATABASE";
/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "RLM_CONFIG";

/// Values read from the TOML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub event_bus_capacity: Option<usize>,
    pub share_tolerance: Option<f64>,
}

/// Resolved ledger configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    pub event_bus_capacity: usize,
    /// Tolerance used when comparing share totals against 100
    pub share_tolerance: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: "info".to_string(),
            event_bus_capacity: 100,
            share_tolerance: DEFAULT_SHARE_TOLERANCE,
        }
    }
}

impl LedgerConfig {
    /// Resolve configuration from CLI arguments, environment, TOML and defaults
    pub fn resolve(cli_database: Option<&Path>, cli_config: Option<&Path>) -> Self {
        let toml_config = match config_file_path(cli_config) {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => {
                    debug!("Loaded config file {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };

        Self::from_sources(
            cli_database,
            std::env::var_os(DATABASE_ENV).map(PathBuf::from),
            toml_config,
        )
    }

    /// Merge already-gathered sources in priority order
    pub fn from_sources(
        cli_database: Option<&Path>,
        env_database: Option<PathBuf>,
        toml_config: TomlConfig,
    ) -> Self {
        let defaults = Self::default();

        // Priority 1-4 for the database path
        let database_path = cli_database
            .map(Path::to_path_buf)
            .or(env_database)
            .or(toml_config.database_path)
            .unwrap_or(defaults.database_path);

        let share_tolerance = match toml_config.share_tolerance {
            Some(t) if t.is_finite() && t >= 0.0 => t,
            Some(t) => {
                warn!("Invalid share_tolerance {} in config, using default", t);
                defaults.share_tolerance
            }
            None => defaults.share_tolerance,
        };

        Self {
            database_path,
            log_level: toml_config.log_level.unwrap_or(defaults.log_level),
            event_bus_capacity: toml_config
                .event_bus_capacity
                .filter(|c| *c > 0)
                .unwrap_or(defaults.event_bus_capacity),
            share_tolerance,
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Locate the config file: explicit path, then `RLM_CONFIG`, then platform paths
fn config_file_path(cli_config: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_config {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("rlm").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/rlm/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default database path
fn default_database_path() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/rlm (or /var/lib/rlm for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("rlm"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/rlm"))
            .join("ledger.db")
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("rlm"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/rlm"))
            .join("ledger.db")
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("rlm"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\rlm"))
            .join("ledger.db")
    } else {
        PathBuf::from("./rlm_data/ledger.db")
    }
}
