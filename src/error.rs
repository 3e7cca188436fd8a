use crate::records::RecordKind;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid {kind} record: {reason}")]
    InvalidRecord { kind: RecordKind, reason: String },
    #[error("{kind} record {id} not found for {date}")]
    RecordNotFound {
        kind: RecordKind,
        id: u64,
        date: String,
    },
    #[error("invalid stock entry {material:?} = {qty}")]
    InvalidStock { material: String, qty: f64 },
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("unknown {what}: {value:?}")]
    UnknownValue { what: &'static str, value: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl StoreError {
    pub(crate) fn invalid(kind: RecordKind, reason: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(what: &'static str, value: &str) -> Self {
        StoreError::UnknownValue {
            what,
            value: value.to_string(),
        }
    }
}
