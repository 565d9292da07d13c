//! File system operations for rusty-pack.
//!
//! This crate provides the disk-facing half of the packing engine:
//! - `escape_glob()` / `FileNameGlob` - Glob-safe file name matching
//! - `SequenceResolver` - Expands view and frame placeholders into concrete files
//! - `FsCopier` / `CommandCopier` - Per-file and external bulk copy services

pub mod copy;
pub mod error;
pub mod glob;
pub mod sequence;

// Re-export main types
pub use copy::{CommandCopier, Copier, FsCopier, SequenceCopy};
pub use error::FileSystemError;
pub use glob::{escape_glob, FileNameGlob};
pub use sequence::{
    FrameNotation, FrameSpec, LiteralEvaluator, PathEvaluator, ResolvedPath, SequenceResolver,
};
