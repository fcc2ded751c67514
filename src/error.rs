//! Error types for the deal engine
//!
//! Malformed listings and thin market data are not errors here: the normalizer
//! substitutes defaults and the estimator reports `Estimate::InsufficientData`.

use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Persistence hook errors (cache + listing history)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row for {id}: {reason}")]
    CorruptRow { id: String, reason: String },
}

/// Reference catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to open catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read catalog CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid catalog row {line}: {reason}")]
    InvalidRow { line: usize, reason: String },
}

/// Failure while scoring a single listing; isolated per listing by the batch scorer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("arithmetic overflow computing {operation}")]
    Arithmetic { operation: &'static str },
}
