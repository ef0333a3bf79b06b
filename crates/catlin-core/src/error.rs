//! Error types for the catlin pipeline.
//!
//! This module defines the error taxonomy shared by the encoding core, the
//! instance log store and the problem builder. Every variant carries enough
//! context (file path, line number, offending token) to diagnose a failure
//! without re-running with extra logging.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The main error type for catlin operations.
#[derive(Debug, Error)]
pub enum CatlinError {
    /// Reading, writing or deleting a file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file the operation was acting on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An append was attempted after the log writer was closed.
    #[error("instance log writer for {path} is closed")]
    WriterClosed {
        /// The instance log whose writer is closed.
        path: PathBuf,
    },

    /// A logged instance record could not be interpreted.
    #[error("malformed instance record at {path}:{line}: {reason} (token '{token}')")]
    MalformedInstanceRecord {
        /// The file the record was read from.
        path: PathBuf,
        /// The 1-based line number of the record.
        line: usize,
        /// The offending token, or the whole line for shape errors.
        token: String,
        /// What was wrong with the token.
        reason: String,
    },

    /// A configuration value was unknown or not numeric.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Memory could not be reserved for an in-memory batch.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A delegated out-of-process trainer failed.
    #[error("external process '{program}' failed ({status}): {stderr}")]
    ExternalProcessFailure {
        /// The program that was executed.
        program: PathBuf,
        /// The exit status as reported by the operating system.
        status: String,
        /// The tail of the captured standard error stream.
        stderr: String,
    },
}

impl CatlinError {
    /// Creates an I/O error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a malformed record error.
    pub fn malformed(
        path: impl AsRef<Path>,
        line: usize,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedInstanceRecord {
            path: path.as_ref().to_path_buf(),
            line,
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Returns true if this error belongs to the I/O failure class.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::WriterClosed { .. })
    }
}

/// A specialized Result type for catlin operations.
pub type Result<T> = std::result::Result<T, CatlinError>;
