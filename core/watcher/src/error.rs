//! Error types for watcher operations.
//!
//! Extraction failures and arbitration losses are not errors; they are part of
//! normal operation and never surface here.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid configuration value for {field}: {details}")]
    ConfigInvalid { field: &'static str, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Messaging Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No response to {request}")]
    NoResponse { request: &'static str },

    #[error("Malformed reply to {request}: {source}")]
    MalformedReply {
        request: &'static str,
        #[source]
        source: serde_json::Error,
    },

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

pub type Result<T> = std::result::Result<T, WatcherError>;
