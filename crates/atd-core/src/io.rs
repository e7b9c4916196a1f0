//! JSON file reading for the change handlers
//!
//! All reads are whole-file: a changed file is always re-read and re-parsed
//! from scratch, which keeps every handler idempotent. Errors carry the
//! offending path so callers can log and drop the event without touching
//! prior state.

use crate::schema::Document;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading a watched file
#[derive(Error, Debug)]
pub enum ReadError {
    /// File I/O error (vanished between notify and read, permissions, ...)
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// File parsed but the top level is not a JSON object
    #[error("Expected a JSON object at the top level of {path}")]
    NotAnObject { path: PathBuf },
}

/// Read and parse a file as arbitrary JSON.
pub fn read_json(path: &Path) -> Result<serde_json::Value, ReadError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ReadError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read and parse a file that must contain a JSON object.
///
/// Used for team configs and task bodies, which are opaque documents but
/// are required to be objects so their fields can be carried through.
pub fn read_document(path: &Path) -> Result<Document, ReadError> {
    match read_json(path)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ReadError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}
