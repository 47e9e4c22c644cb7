use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Failure inside a repository call.
///
/// Referential-integrity violations on insert are not errors: the adapters
/// log and skip the offending row. Everything here aborts the current run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("KeyDB: {0}")]
    KeyDb(#[from] redis::RedisError),

    #[error("document encoding: {0}")]
    Document(#[from] serde_json::Error),

    #[error("{entity} {id} already exists")]
    DuplicateId { entity: &'static str, id: Uuid },
}

/// Failure writing the metric log.
#[derive(Debug, Error)]
pub enum MetricLogError {
    #[error("metric log I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("metric log CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure of a measured operation: either the operation or the metric write.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    MetricLog(#[from] MetricLogError),
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}
