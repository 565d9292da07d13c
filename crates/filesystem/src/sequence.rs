//! Path sequence resolution.
//!
//! A path stored in a project may denote many files: a multi-view placeholder
//! (`%v` / `%V`) expands to one path per view, and a frame placeholder
//! (printf `%04d` or hash `####`) denotes a numbered sequence. The resolver
//! turns such a path into the concrete files that exist on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use rusty_pack_common::{
    file_name, lexical_normalize, parent_dir, prepend_project_directory, to_absolute,
    to_posix_path, to_posix_str, VIEW_PLACEHOLDERS,
};

use crate::glob::{escape_glob, FileNameGlob};

/// Host services the resolver needs: declared views, expression evaluation
/// and the project directory used for relative paths.
pub trait PathEvaluator {
    /// Names of the views declared in the project.
    fn views(&self) -> Vec<String>;

    /// Evaluate embedded expressions in a path string.
    ///
    /// Returns `None` when evaluation fails; the resolver then uses the
    /// literal string.
    fn evaluate(&self, text: &str) -> Option<String>;

    /// Project directory relative paths are resolved against, if any.
    fn project_directory(&self) -> Option<String>;
}

/// Evaluator that performs no expression evaluation.
#[derive(Debug, Clone, Default)]
pub struct LiteralEvaluator {
    /// Declared views.
    pub views: Vec<String>,
    /// Project directory.
    pub project_directory: Option<String>,
}

impl PathEvaluator for LiteralEvaluator {
    fn views(&self) -> Vec<String> {
        self.views.clone()
    }

    fn evaluate(&self, text: &str) -> Option<String> {
        Some(text.to_string())
    }

    fn project_directory(&self) -> Option<String> {
        self.project_directory.clone()
    }
}

/// Notation a frame placeholder was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameNotation {
    /// `%04d` style.
    Printf,
    /// `####` style.
    Hash,
}

/// A frame placeholder detected in a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    /// Text before the placeholder.
    pub prefix: String,
    /// Field width; `None` for an unpadded `%d`.
    pub width: Option<usize>,
    /// Text after the placeholder.
    pub suffix: String,
    /// How the placeholder was written.
    pub notation: FrameNotation,
}

fn printf_regex() -> &'static Regex {
    static PRINTF: OnceLock<Regex> = OnceLock::new();
    PRINTF.get_or_init(|| Regex::new(r"%0?(\d*)d").expect("printf pattern is valid"))
}

impl FrameSpec {
    /// Detect a frame placeholder in a file name.
    ///
    /// Printf notation takes precedence over hash notation. Only the first
    /// placeholder is considered.
    pub fn detect(name: &str) -> Option<FrameSpec> {
        if let Some(m) = printf_regex().captures(name) {
            let whole = m.get(0)?;
            let width: Option<usize> = m
                .get(1)
                .map(|w| w.as_str())
                .filter(|w| !w.is_empty())
                .and_then(|w| w.parse().ok());
            return Some(FrameSpec {
                prefix: name[..whole.start()].to_string(),
                width,
                suffix: name[whole.end()..].to_string(),
                notation: FrameNotation::Printf,
            });
        }

        let start: usize = name.find('#')?;
        let run: usize = name[start..].chars().take_while(|c| *c == '#').count();
        Some(FrameSpec {
            prefix: name[..start].to_string(),
            width: Some(run),
            suffix: name[start + run..].to_string(),
            notation: FrameNotation::Hash,
        })
    }

    /// Glob-safe file name pattern: one `?` per digit of width.
    pub fn glob(&self) -> String {
        let wildcard: String = match self.width {
            Some(width) => "?".repeat(width.max(1)),
            None => "*".to_string(),
        };
        format!("{}{}{}", escape_glob(&self.prefix), wildcard, escape_glob(&self.suffix))
    }

    /// Playback pattern in printf notation, e.g. `plate.%04d.exr`.
    pub fn printf(&self) -> String {
        let placeholder: String = match self.width {
            Some(width) => format!("%0{}d", width.max(1)),
            None => "%d".to_string(),
        };
        format!("{}{}{}", self.prefix, placeholder, self.suffix)
    }
}

/// Result of resolving one stored path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute POSIX paths of the existing files, in discovery order.
    pub files: Vec<String>,
    /// Whether the project directory had to be prefixed to find the files.
    pub used_project_root: bool,
    /// Glob-safe filter re-matching the same file set.
    pub filter: String,
    /// Evaluated, absolute form of the stored path (views not expanded).
    pub path: String,
    /// Frame placeholder, if the path denotes a sequence.
    pub frame: Option<FrameSpec>,
}

impl ResolvedPath {
    /// Whether no file was found.
    pub fn is_missing(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether the path denotes a frame sequence.
    pub fn is_sequence(&self) -> bool {
        self.frame.is_some()
    }

    /// File name to use when relinking: the printf playback pattern for
    /// sequences, the plain file name otherwise.
    pub fn playback_name(&self) -> String {
        match &self.frame {
            Some(frame) => frame.printf(),
            None => file_name(&self.path).to_string(),
        }
    }
}

/// Expands stored paths into the files they denote.
pub struct SequenceResolver<'a> {
    evaluator: &'a dyn PathEvaluator,
}

impl<'a> SequenceResolver<'a> {
    /// Create a resolver backed by the given evaluator.
    pub fn new(evaluator: &'a dyn PathEvaluator) -> Self {
        Self { evaluator }
    }

    /// Resolve a stored path into concrete files.
    ///
    /// Never fails: a path that matches nothing yields an empty file list.
    ///
    /// # Arguments
    /// * `raw` - Path as stored in the project
    pub fn resolve(&self, raw: &str) -> ResolvedPath {
        let project_dir: String = self.evaluator.project_directory().unwrap_or_default();
        let mut files: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut used_project_root: bool = false;

        for view_path in self.expand_views(raw) {
            let (found, used_root): (Vec<String>, bool) = self.resolve_one(&view_path, &project_dir);
            used_project_root |= used_root;
            for file in found {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        }

        let mut path: String = self.evaluate(raw);
        if used_project_root {
            path = prepend_project_directory(&path, &project_dir);
        }
        let path: String = absolutize(&path);

        let name: &str = file_name(&path);
        let frame: Option<FrameSpec> = FrameSpec::detect(name);
        let name_glob: String = match &frame {
            Some(frame) => frame.glob(),
            None => escape_glob(name),
        };
        let filter: String = format!("{}/{}", escape_glob(parent_dir(&path)), name_glob);

        ResolvedPath {
            files,
            used_project_root,
            filter,
            path,
            frame,
        }
    }

    /// One path per declared view when a view placeholder is present.
    fn expand_views(&self, raw: &str) -> Vec<String> {
        if !VIEW_PLACEHOLDERS.iter().any(|p| raw.contains(p)) {
            return vec![raw.to_string()];
        }
        let views: Vec<String> = self.evaluator.views();
        if views.is_empty() {
            log::debug!("No views declared for view placeholder in {}", raw);
            return vec![raw.to_string()];
        }
        views
            .iter()
            .map(|view| {
                VIEW_PLACEHOLDERS
                    .iter()
                    .fold(raw.to_string(), |acc, placeholder| acc.replace(placeholder, view))
            })
            .collect()
    }

    fn evaluate(&self, text: &str) -> String {
        match self.evaluator.evaluate(text) {
            Some(value) => to_posix_str(&value),
            None => {
                log::debug!("Expression evaluation failed, using literal path: {}", text);
                to_posix_str(text)
            }
        }
    }

    /// Resolve a single view-expanded path.
    fn resolve_one(&self, view_path: &str, project_dir: &str) -> (Vec<String>, bool) {
        let mut path: String = self.evaluate(view_path);
        let mut dir: String = parent_dir(&path).to_string();
        let mut used_project_root: bool = false;

        if !Path::new(&dir).is_dir() && !project_dir.is_empty() {
            let candidate: String = if dir.is_empty() {
                to_posix_str(project_dir)
            } else {
                prepend_project_directory(&dir, project_dir)
            };
            if Path::new(&candidate).is_dir() {
                used_project_root = true;
                dir = candidate;
                path = prepend_project_directory(&path, project_dir);
            }
        }

        if !Path::new(&dir).is_dir() {
            return (Vec::new(), used_project_root);
        }

        let name: &str = file_name(&path);
        let mut files: Vec<String> = Vec::new();

        if let Some(frame) = FrameSpec::detect(name) {
            match FileNameGlob::new(&frame.glob()) {
                Ok(glob) => match glob.list_matching(Path::new(&dir)) {
                    Ok(found) => files.extend(found.iter().map(|p| absolutize(&to_posix_path(p)))),
                    Err(e) => log::warn!("Cannot list {} in {}: {}", glob.pattern(), dir, e),
                },
                Err(e) => log::warn!("Cannot build sequence pattern for {}: {}", path, e),
            }
        } else if Path::new(&path).is_file() {
            files.push(absolutize(&path));
        } else if !project_dir.is_empty() {
            let relative: String = prepend_project_directory(&path, project_dir);
            if Path::new(&relative).is_file() {
                used_project_root = true;
                files.push(absolutize(&relative));
            }
        }

        (files, used_project_root)
    }
}

/// Make a POSIX path absolute and lexically normalized.
fn absolutize(path: &str) -> String {
    match to_absolute(Path::new(path)) {
        Ok(abs) => {
            let normalized: PathBuf = lexical_normalize(&abs);
            to_posix_path(&normalized)
        }
        Err(e) => {
            log::warn!("Cannot make path absolute: {}", e);
            to_posix_str(path)
        }
    }
}
