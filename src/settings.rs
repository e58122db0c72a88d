//! Application settings persistence
//!
//! Handles saving and loading the database settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DatabaseConfig};

/// Name length limit used when the settings file does not set one
pub const DEFAULT_MAX_NAME_LENGTH: usize = 100;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Where and how to reach the store
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Upper bound on piano and category names, in characters
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite URL, e.g. `sqlite:/var/lib/pianos/pianos.db?mode=rwc`
    #[serde(default = "default_connection_string")]
    pub connection_string: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a free pooled connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_name_length() -> usize {
    DEFAULT_MAX_NAME_LENGTH
}

fn default_connection_string() -> String {
    format!("sqlite:{}?mode=rwc", data_dir().join("pianos.db").display())
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT.as_secs()
}

/// Platform data directory, `.` if it cannot be determined
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "pianos", "Pianos")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            max_name_length: default_max_name_length(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pianos", "Pianos")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            return Self::default();
        };

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::file_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether the connection string points at the database in [`data_dir`]
    pub fn uses_default_database(&self) -> bool {
        self.database.connection_string == default_connection_string()
    }

    /// Connection factory input built from these settings
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database.connection_string, self.max_name_length)
            .with_max_connections(self.database.max_connections)
            .with_acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
    }
}

/// Errors that can occur with settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            database: DatabaseSettings {
                connection_string: "sqlite:/tmp/pianos-test.db?mode=rwc".to_string(),
                max_connections: 2,
                acquire_timeout_secs: 3,
            },
            max_name_length: 40,
        };
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "database": { "connection_string": "sqlite::memory:" } }"#,
        )
        .unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.database.connection_string, "sqlite::memory:");
        assert_eq!(loaded.database.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(loaded.max_name_length, DEFAULT_MAX_NAME_LENGTH);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Settings::load_from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SettingsError::Io(_))));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_database_config() {
        let mut settings = Settings::default();
        settings.database.connection_string = "sqlite:pianos.db".to_string();
        settings.database.acquire_timeout_secs = 7;
        settings.max_name_length = 12;

        let config = settings.database_config();
        assert_eq!(config.connection_string, "sqlite:pianos.db");
        assert_eq!(config.max_name_length, 12);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.acquire_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_uses_default_database() {
        let mut settings = Settings::default();
        assert!(settings.uses_default_database());

        settings.database.connection_string = "sqlite:/srv/pianos.db".to_string();
        assert!(!settings.uses_default_database());
    }

    #[test]
    fn test_default_connection_string_is_sqlite() {
        let settings = Settings::default();
        assert!(settings.database.connection_string.starts_with("sqlite:"));
        assert!(settings.database.connection_string.ends_with("pianos.db?mode=rwc"));
    }
}
