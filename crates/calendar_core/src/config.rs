//! TOML configuration for the calendar core and its binaries.
//!
//! # Responsibility
//! - Describe log, storage and listing settings with serde defaults.
//! - Reject settings the core cannot run with before anything is opened.
//!
//! # Invariants
//! - A missing section or key falls back to its default.
//! - A loaded config has already passed `validate()`.

use crate::logging::normalize_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default number of events per `list_all` page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub listing: ListingConfig,
}

impl CalendarConfig {
    /// Loads and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Loads `path` when it exists, otherwise returns validated defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log.level).map_err(ConfigError::Invalid)?;

        let dir = self.log.dir.trim();
        if !dir.is_empty() && !Path::new(dir).is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "log.dir must be an absolute path, got `{dir}`"
            )));
        }

        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "storage.path is required for the sqlite backend".to_string(),
            ));
        }

        if self.listing.page_size == 0 {
            return Err(ConfigError::Invalid(
                "listing.page_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for CalendarConfig {
    type Err = ConfigError;

    /// Parses and validates a TOML document.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: CalendarConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// File logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of trace|debug|info|warn|error.
    pub level: String,
    /// Absolute log directory; empty disables file logging.
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: String::new(),
        }
    }
}

impl LogConfig {
    pub fn is_enabled(&self) -> bool {
        !self.dir.trim().is_empty()
    }
}

/// Which event repository backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Event store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file, used by the sqlite backend only.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("calendar.sqlite3"),
        }
    }
}

/// Listing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CalendarConfig, ConfigError, StorageBackend};

    #[test]
    fn empty_document_yields_defaults() {
        let config: CalendarConfig = "".parse().unwrap();
        assert_eq!(config, CalendarConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.listing.page_size, 25);
        assert!(!config.log.is_enabled());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = "[listing]\npage_size = 0\n"
            .parse::<CalendarConfig>()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
