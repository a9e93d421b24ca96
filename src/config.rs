use crate::core::db::sqlite::SqliteDriver;
use crate::core::{DbError, Result};
use crate::sql::StatementPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no connection string is configured.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Top-level settings structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub database: Option<DatabaseSettings>,
    pub sqlite: Option<SqliteSettings>,
    pub statements: Option<StatementSettings>,
}

/// Connection-related settings.
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub auto_connect: Option<bool>,
}

/// SQLite driver settings.
#[derive(Debug, Default, Deserialize)]
pub struct SqliteSettings {
    pub data_dir: Option<PathBuf>,
}

/// Statement checking settings.
#[derive(Debug, Default, Deserialize)]
pub struct StatementSettings {
    pub policy: Option<StatementPolicy>,
}

impl Settings {
    /// `<config dir>/dbsession/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dbsession").join("config.toml"))
    }

    /// Configured connection string, falling back to `DATABASE_URL`.
    pub fn database_url(&self) -> Option<String> {
        self.database_url_or(std::env::var(DATABASE_URL_ENV).ok())
    }

    fn database_url_or(&self, fallback: Option<String>) -> Option<String> {
        self.database
            .as_ref()
            .and_then(|db| db.url.clone())
            .or(fallback)
            .filter(|url| !url.trim().is_empty())
    }

    pub fn auto_connect(&self) -> bool {
        self.database.as_ref().and_then(|db| db.auto_connect).unwrap_or(true)
    }

    pub fn statement_policy(&self) -> StatementPolicy {
        self.statements
            .as_ref()
            .and_then(|s| s.policy)
            .unwrap_or_default()
    }

    /// SQLite driver for these settings: file-backed under `data_dir`, else in memory.
    pub fn sqlite_driver(&self) -> SqliteDriver {
        match self.sqlite.as_ref().and_then(|s| s.data_dir.clone()) {
            Some(dir) => SqliteDriver::with_data_dir(dir),
            None => SqliteDriver::in_memory(),
        }
    }
}

/// Loads settings from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML settings file.
///
/// # Example
///
/// ```no_run
/// let settings = dbsession::config::load_settings("config.toml")?;
/// println!("{:?}", settings);
/// # Ok::<(), dbsession::DbError>(())
/// ```
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| DbError::Settings(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| DbError::Settings(format!("cannot parse {}: {}", path.display(), e)))
}
