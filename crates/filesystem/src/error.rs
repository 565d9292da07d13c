//! Error types for file system operations.

use rusty_pack_common::PathError;
use thiserror::Error;

/// Errors that can occur while resolving or copying resources.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// A glob pattern could not be compiled.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern {
        /// The offending pattern.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    /// I/O error at a specific path.
    #[error("I/O error at {path}: {source}")]
    IoError {
        /// Path where the error occurred.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Path normalization error.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Destination already exists; package directories are write-once.
    #[error("Destination already exists: {path}")]
    DestinationExists {
        /// The existing destination.
        path: String,
    },

    /// External bulk copy command could not be started or exited non-zero.
    #[error("Copy command '{program}' failed (code {return_code:?}): {stderr}")]
    CopyCommandFailed {
        /// Program that was run.
        program: String,
        /// Exit code, `None` if the process was killed or never started.
        return_code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
}

impl FileSystemError {
    /// Create an IoError for a path.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `source` - The underlying IO error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}
