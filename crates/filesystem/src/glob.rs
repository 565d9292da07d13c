//! Glob matching of file names inside a single directory.
//!
//! Frame placeholders are turned into `?` wildcards, but the literal parts of a
//! file name may themselves contain glob metacharacters (`plate[v1].####.exr`).
//! Literal parts are escaped with [`escape_glob()`] before the wildcards are
//! inserted, so the resulting pattern is safe to re-match later:
//!
//! ```
//! use rusty_pack_filesystem::glob::{escape_glob, FileNameGlob};
//!
//! let pattern = format!("{}.????.exr", escape_glob("plate[v1]"));
//! let glob = FileNameGlob::new(&pattern).unwrap();
//!
//! assert!(glob.matches("plate[v1].1001.exr"));
//! assert!(!glob.matches("platev1.1001.exr"));
//! ```

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::error::FileSystemError;

/// Escape special glob characters in a string to treat it as a literal path.
///
/// This function escapes the following glob metacharacters:
/// `*`, `?`, `[`, `]`, `{`, `}` and `!`.
///
/// # Example
/// ```
/// use rusty_pack_filesystem::glob::escape_glob;
///
/// assert_eq!(escape_glob("file[1].txt"), r"file\[1\].txt");
/// assert_eq!(escape_glob("test*.log"), r"test\*.log");
/// ```
pub fn escape_glob(s: &str) -> String {
    let mut escaped: String = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '*' | '?' | '[' | ']' | '{' | '}' | '!' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// A compiled glob matching bare file names (no directory part).
#[derive(Debug, Clone)]
pub struct FileNameGlob {
    pattern: String,
    matcher: GlobMatcher,
}

impl FileNameGlob {
    /// Compile a file name pattern.
    ///
    /// # Arguments
    /// * `pattern` - Glob-safe file name pattern (literal parts escaped)
    ///
    /// # Errors
    /// Returns error if the pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, FileSystemError> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| FileSystemError::InvalidGlobPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check whether a file name matches.
    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    /// List the files directly inside `dir` whose names match.
    ///
    /// # Arguments
    /// * `dir` - Directory to list (not recursed)
    ///
    /// # Returns
    /// Matching file paths, sorted.
    ///
    /// # Errors
    /// Returns error if the directory cannot be read.
    pub fn list_matching(&self, dir: &Path) -> Result<Vec<std::path::PathBuf>, FileSystemError> {
        let mut found: Vec<std::path::PathBuf> = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry: walkdir::DirEntry = entry.map_err(|e| FileSystemError::IoError {
                path: dir.display().to_string(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.matches(&name) {
                found.push(entry.into_path());
            }
        }
        Ok(found)
    }
}
