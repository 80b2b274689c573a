//! Error types for the reference shell.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Registry Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Registry store is in-memory and has no file path")]
    NoStorePath,

    #[error("Failed to serialize registry store: {0}")]
    Serialize(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ShellError>;
