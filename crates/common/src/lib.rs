//! Shared types and utilities for rusty-pack.
//!
//! This crate provides functionality used across all rusty-pack crates:
//! - POSIX path normalization and the relative path algebra used for relinking
//! - Path template expansion with soft-fail token substitution
//! - Content hashing behind a pluggable service trait
//! - Human-readable size formatting
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod hash;
pub mod path_utils;
pub mod size;
pub mod template;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PathError;
pub use hash::{combine_hashes, hash_bytes, ContentHasher, SkipHashing, Xxh3ContentHasher, Xxh3Hasher};
pub use path_utils::{
    file_extension, file_name, join_posix, lexical_normalize, parent_dir,
    prepend_project_directory, relative_path, to_absolute, to_posix_path, to_posix_str,
    RelativePath,
};
pub use size::format_size;
pub use template::{expand_template, join_template, TokenMap};
