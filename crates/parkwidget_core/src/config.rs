//! Runtime configuration.
//!
//! # Responsibility
//! - Load `widget.toml` from the host data directory, defaulting every key.
//! - Reject values that would break scheduling or store access.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "widget.toml";

const MAX_BUSY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config syntax: {err}"),
            Self::Invalid(details) => write!(f, "invalid config value: {details}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Settings for one widget runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub periodic_interval_minutes: u64,
    pub store_busy_timeout_ms: u64,
    pub primary_db_file: String,
    pub fallback_file: String,
    /// `None` uses the build-mode default level.
    pub log_level: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            periodic_interval_minutes: 15,
            store_busy_timeout_ms: 2_000,
            primary_db_file: "parkwidget.sqlite3".to_string(),
            fallback_file: "parkwidget_fallback.json".to_string(),
            log_level: None,
        }
    }
}

impl WidgetConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `<data_dir>/widget.toml`; a missing file yields defaults.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        match fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.periodic_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "periodic_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.store_busy_timeout_ms == 0 || self.store_busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store_busy_timeout_ms must be within 1..={MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        for (key, value) in [
            ("primary_db_file", &self.primary_db_file),
            ("fallback_file", &self.fallback_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} cannot be empty")));
            }
        }
        if self.primary_db_file == self.fallback_file {
            return Err(ConfigError::Invalid(
                "primary_db_file and fallback_file must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_minutes.saturating_mul(60))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }

    pub fn primary_db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.primary_db_file)
    }

    pub fn fallback_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.fallback_file)
    }

    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, WidgetConfig};
    use crate::logging::default_log_level;
    use std::time::Duration;

    #[test]
    fn effective_log_level_prefers_configured_value() {
        let configured = WidgetConfig::from_toml_str("log_level = \"warn\"\n").unwrap();
        assert_eq!(configured.effective_log_level(), "warn");

        let defaulted = WidgetConfig::default();
        assert_eq!(defaulted.effective_log_level(), default_log_level());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = WidgetConfig::from_toml_str("periodic_interval_minutes = 30\n").unwrap();
        assert_eq!(config.periodic_interval(), Duration::from_secs(1800));
        assert_eq!(config.primary_db_file, "parkwidget.sqlite3");
        assert!(config.log_level.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = WidgetConfig::from_toml_str("periodic_interval_minutes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = WidgetConfig::from_toml_str("periodic_interval_minutes = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WidgetConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, WidgetConfig::default());
    }
}
