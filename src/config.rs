// ⚙️ Configuration - eco-ledger.toml with defaults for every field

use crate::db::SqliteStore;
use crate::error::{Result, StoreError};
use crate::persistence::{DocumentKey, DocumentStore, JsonFileStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "eco-ledger.toml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_COLLECTION: &str = "ecorecycle";
pub const DEFAULT_DOCUMENT: &str = "db";
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(StoreError::unknown("backend", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub collection: String,
    pub document: String,
    /// Accent color for the dashboard (teal, blue, green, ...)
    pub theme_color: String,
    pub server_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            backend: Backend::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            document: DEFAULT_DOCUMENT.to_string(),
            theme_color: "teal".to_string(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Explicit path must exist; otherwise `eco-ledger.toml` is used when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn document_key(&self) -> DocumentKey {
        DocumentKey::new(&self.collection, &self.document)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("eco-ledger.db")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }

    pub fn open_backend(&self) -> Result<Box<dyn DocumentStore>> {
        self.ensure_dirs()?;
        let key = self.document_key();
        Ok(match self.backend {
            Backend::Json => Box::new(JsonFileStore::new(&self.data_dir, key)),
            Backend::Sqlite => Box::new(SqliteStore::open(&self.sqlite_path(), key)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            backend = "sqlite"
            theme_color = "blue"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.theme_color, "blue");
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/eco-ledger.toml"))).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn test_open_backend_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("nested"),
            backend: Backend::Sqlite,
            ..Config::default()
        };

        let backend = config.open_backend().unwrap();

        assert!(config.data_dir.exists());
        assert!(backend.load().unwrap().is_none());
    }
}
