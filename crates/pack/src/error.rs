//! Error types for the packaging pipeline.

use rusty_pack_common::PathError;
use rusty_pack_filesystem::FileSystemError;
use thiserror::Error;

use crate::orchestrator::Phase;

/// Errors loading pack settings or anatomy documents.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid anatomy: {reason}")]
    InvalidAnatomy { reason: String },
}

/// Errors reported by a project host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Unknown node: {node}")]
    UnknownNode { node: String },

    #[error("Node {node} has no parameter {parameter}")]
    UnknownParameter { node: String, parameter: String },

    #[error("Expression evaluation failed for '{text}': {reason}")]
    Evaluation { text: String, reason: String },

    #[error("Cannot convert {node} to a group: {reason}")]
    GroupConversion { node: String, reason: String },

    #[error("Failed to save project to {path}: {reason}")]
    Save { path: String, reason: String },
}

/// Errors that abort a pack run.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("{operation} cannot run in phase {current:?}, expected {expected:?}")]
    InvalidPhase {
        operation: &'static str,
        current: Phase,
        expected: Phase,
    },

    #[error("Pack cancelled after {completed} of {total} records")]
    Cancelled { completed: usize, total: usize },

    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    Path(#[from] PathError),
}
