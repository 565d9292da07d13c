//! Path normalization and relative path algebra.
//!
//! Paths handled by the packing engine are POSIX-style strings: backslashes are
//! converted to forward slashes as soon as a path enters the engine and never
//! survive past resolution.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Convert a path to absolute without resolving symlinks.
///
/// # Arguments
/// * `path` - Path to convert (relative or absolute)
///
/// # Returns
/// Absolute path, joining with current directory if relative.
///
/// # Errors
/// Returns error if current directory cannot be determined.
pub fn to_absolute(path: &Path) -> Result<PathBuf, PathError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        std::env::current_dir()
            .map(|cwd: PathBuf| cwd.join(path))
            .map_err(|e: std::io::Error| PathError::from_io(path.display().to_string(), e))
    }
}

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically.
/// Does not access the filesystem or resolve symlinks.
///
/// # Arguments
/// * `path` - Path to normalize
///
/// # Returns
/// Normalized path with `.` and `..` resolved lexically.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Convert a path to a POSIX-style string (forward slashes).
///
/// # Arguments
/// * `path` - Path to convert
///
/// # Returns
/// String with forward slashes as separators. Absolute paths keep their
/// leading slash.
pub fn to_posix_path(path: &Path) -> String {
    let mut out: String = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    to_posix_str(&out)
}

/// Replace every backslash in a path string with a forward slash.
pub fn to_posix_str(path: &str) -> String {
    path.replace('\\', "/")
}

/// Parent directory of a POSIX path string (`""` when there is none).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a POSIX path string.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Extension of the last path segment, without the dot.
///
/// Returns an empty string when the file name has no extension.
pub fn file_extension(path: &str) -> &str {
    let name: &str = file_name(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx + 1..],
    }
}

/// Join POSIX path parts with single slashes, skipping empty parts.
///
/// # Arguments
/// * `parts` - Path fragments; leading/trailing slashes are collapsed
///
/// # Returns
/// The joined path. A leading slash on the first non-empty part is kept.
pub fn join_posix<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out: String = String::new();
    for part in parts {
        let part: &str = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(part.trim_end_matches('/'));
            if out.is_empty() {
                out.push('/');
            }
            continue;
        }
        let trimmed: &str = part.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(trimmed);
    }
    out
}

/// Merge a project directory with a path stored relative to it.
///
/// `./x` and `/x` are both resolved as `project_dir/x`; any other form is
/// appended with a separator. An empty project directory leaves the path
/// unchanged.
///
/// # Arguments
/// * `path` - Path as stored in the project
/// * `project_dir` - Project directory (may be empty)
pub fn prepend_project_directory(path: &str, project_dir: &str) -> String {
    let project_dir: String = to_posix_str(project_dir);
    let project_dir: &str = project_dir.trim_end_matches('/');
    let path: String = to_posix_str(path);

    if project_dir.is_empty() || path.is_empty() {
        return path;
    }

    if let Some(rest) = path.strip_prefix("./") {
        format!("{}/{}", project_dir, rest)
    } else if path.starts_with('/') {
        format!("{}{}", project_dir, path)
    } else {
        format!("{}/{}", project_dir, path)
    }
}

/// A path expressed relative to a root, with the number of levels ascended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath {
    /// Relative path string, including any leading `..` segments.
    pub path: String,
    /// Number of directories ascended from the root.
    pub up: usize,
    /// Part of the path below the common ancestor (no `..` segments).
    pub tail: String,
}

impl RelativePath {
    /// Whether the path stays inside the root.
    pub fn is_within_root(&self) -> bool {
        self.up == 0
    }

    /// Build a portable expression that ascends `up` directories from the
    /// directory of the file named by `current_file`.
    ///
    /// The consumer of the expression only knows its own location at
    /// evaluation time, so the absolute root is never embedded.
    ///
    /// # Arguments
    /// * `current_file` - Host expression evaluating to the current file path
    ///
    /// # Example
    /// ```
    /// use rusty_pack_common::relative_path;
    ///
    /// let rel = relative_path("/a/x/d.exr", "/a/b/c");
    /// assert_eq!(
    ///     rel.to_expression("[value root.name]"),
    ///     "[file dirname [file dirname [file dirname [value root.name]]]]/x/d.exr"
    /// );
    /// ```
    pub fn to_expression(&self, current_file: &str) -> String {
        let mut expression: String = current_file.to_string();
        for _ in 0..=self.up {
            expression = format!("[file dirname {}]", expression);
        }
        if self.tail.is_empty() {
            expression
        } else {
            format!("{}/{}", expression, self.tail)
        }
    }
}

/// Express `path` relative to `root`.
///
/// When `path` starts with `root` (at a segment boundary) the remainder is
/// returned directly. Otherwise both paths are walked segment by segment from
/// the start; one `..` is emitted per root segment after the divergence point
/// and the rest of `path` is appended.
///
/// # Arguments
/// * `path` - POSIX path to express relatively
/// * `root` - POSIX directory the result is relative to
///
/// # Returns
/// The relative path and the number of levels ascended.
pub fn relative_path(path: &str, root: &str) -> RelativePath {
    let path: String = to_posix_str(path);
    let root: String = to_posix_str(root);
    let root_trimmed: &str = if root.len() > 1 {
        root.trim_end_matches('/')
    } else {
        root.as_str()
    };

    if let Some(rest) = path.strip_prefix(root_trimmed) {
        if rest.is_empty() || rest.starts_with('/') || root_trimmed.ends_with('/') {
            let tail: String = rest.trim_start_matches('/').to_string();
            return RelativePath {
                path: tail.clone(),
                up: 0,
                tail,
            };
        }
    }

    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let root_segments: Vec<&str> = root_trimmed.split('/').filter(|s| !s.is_empty()).collect();

    let common: usize = path_segments
        .iter()
        .zip(root_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let up: usize = root_segments.len() - common;
    let tail: String = path_segments[common..].join("/");

    let mut parts: Vec<&str> = vec![".."; up];
    parts.extend_from_slice(&path_segments[common..]);

    RelativePath {
        path: parts.join("/"),
        up,
        tail,
    }
}
