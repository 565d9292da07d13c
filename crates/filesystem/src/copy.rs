//! Copy services used to populate a package.
//!
//! Package directories are write-once: a destination that already exists is
//! never overwritten. Single files are always copied in-process; frame
//! sequences can be handed to an external bulk copy tool with
//! [`CommandCopier`].

use std::path::Path;
use std::process::{Command, Output};

use rusty_pack_common::parent_dir;

use crate::error::FileSystemError;

/// A whole frame sequence to copy from one directory into another.
#[derive(Debug, Clone)]
pub struct SequenceCopy<'a> {
    /// Directory holding the source frames.
    pub source_dir: &'a str,
    /// Directory receiving the frames.
    pub destination_dir: &'a str,
    /// Glob-safe file name pattern matching the frames.
    pub pattern: &'a str,
    /// Individual (source, destination) file pairs.
    pub files: &'a [(String, String)],
}

/// Service copying resources into the package.
pub trait Copier {
    /// Copy one file, creating the destination directory on demand.
    ///
    /// # Returns
    /// Number of bytes copied.
    ///
    /// # Errors
    /// Returns error if the destination exists or the copy fails.
    fn copy_file(&self, source: &str, destination: &str) -> Result<u64, FileSystemError>;

    /// Copy a frame sequence.
    ///
    /// The default implementation copies the files one by one and stops at
    /// the first failure.
    ///
    /// # Returns
    /// Number of bytes copied.
    fn copy_sequence(&self, sequence: &SequenceCopy<'_>) -> Result<u64, FileSystemError> {
        let mut bytes: u64 = 0;
        for (source, destination) in sequence.files {
            bytes += self.copy_file(source, destination)?;
        }
        Ok(bytes)
    }
}

/// In-process copier using `std::fs::copy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCopier;

impl Copier for FsCopier {
    fn copy_file(&self, source: &str, destination: &str) -> Result<u64, FileSystemError> {
        if Path::new(destination).exists() {
            return Err(FileSystemError::DestinationExists {
                path: destination.to_string(),
            });
        }
        create_parent_dir(destination)?;
        std::fs::copy(source, destination).map_err(|e| FileSystemError::io(source, e))
    }
}

/// Copier delegating frame sequences to an external command.
///
/// The argument list is a template: `{source_dir}`, `{target_dir}` and
/// `{pattern}` are substituted per sequence. Single files fall back to
/// [`FsCopier`].
#[derive(Debug, Clone)]
pub struct CommandCopier {
    program: String,
    args: Vec<String>,
}

impl CommandCopier {
    /// Create a bulk copier from an argv template.
    ///
    /// # Arguments
    /// * `argv` - Program followed by its argument templates
    ///
    /// # Returns
    /// `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// The program run for each sequence.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Substitute the sequence placeholders. Pattern escapes are kept verbatim.
    fn expand_args(&self, sequence: &SequenceCopy<'_>) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{source_dir}", sequence.source_dir)
                    .replace("{target_dir}", sequence.destination_dir)
                    .replace("{pattern}", sequence.pattern)
            })
            .collect()
    }
}

impl Copier for CommandCopier {
    fn copy_file(&self, source: &str, destination: &str) -> Result<u64, FileSystemError> {
        FsCopier.copy_file(source, destination)
    }

    fn copy_sequence(&self, sequence: &SequenceCopy<'_>) -> Result<u64, FileSystemError> {
        if let Some((_, existing)) = sequence
            .files
            .iter()
            .find(|(_, destination)| Path::new(destination).exists())
        {
            return Err(FileSystemError::DestinationExists {
                path: existing.clone(),
            });
        }

        std::fs::create_dir_all(sequence.destination_dir)
            .map_err(|e| FileSystemError::io(sequence.destination_dir, e))?;

        let args: Vec<String> = self.expand_args(sequence);
        log::debug!("Running bulk copy: {} {}", self.program, args.join(" "));

        let output: Output = Command::new(&self.program).args(&args).output().map_err(|e| {
            FileSystemError::CopyCommandFailed {
                program: self.program.clone(),
                return_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            }
        })?;

        if !output.status.success() {
            return Err(FileSystemError::CopyCommandFailed {
                program: self.program.clone(),
                return_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let bytes: u64 = sequence
            .files
            .iter()
            .filter_map(|(source, _)| std::fs::metadata(source).ok())
            .map(|m| m.len())
            .sum();
        Ok(bytes)
    }
}

fn create_parent_dir(destination: &str) -> Result<(), FileSystemError> {
    let parent: &str = parent_dir(destination);
    if parent.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|e| FileSystemError::io(parent, e))
}
