//! Crate error type.
//!
//! Only the I/O-facing surfaces (settings, record files, export, date
//! arguments on the CLI) return errors. Window computation and record search
//! are total and never fail.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a file failed
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be decoded or encoded
    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The platform did not report a configuration directory
    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    /// A record file must hold an array (or a single object)
    #[error("expected an array of records, got {found}")]
    NotRecords { found: &'static str },

    /// Export was asked to serialize zero records
    #[error("no data to export")]
    EmptyExport,

    /// A date string did not match any supported layout
    #[error("invalid date: {input}")]
    InvalidDate { input: String },

    /// A command-line value was out of range or malformed
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by user-supplied callbacks.
///
/// Failures are logged by the caller and never propagated.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
