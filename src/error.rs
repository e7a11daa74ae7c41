//! Error types for the loader
//!
//! [`LoadError`] aborts the whole run. [`EntryError`] only ever aborts the one
//! entry it was raised for; the driver records it and moves on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error at '{path}': {message}")]
    Validation { path: String, message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
