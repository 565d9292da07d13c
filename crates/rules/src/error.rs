//! Error types for category rules.

use thiserror::Error;

/// Errors raised while reading or compiling category rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid filter combination '{value}', expected AND or OR")]
    InvalidCombineMode { value: String },

    #[error("Invalid regex '{pattern}' in category '{category}': {reason}")]
    InvalidRegex {
        category: String,
        pattern: String,
        reason: String,
    },
}
