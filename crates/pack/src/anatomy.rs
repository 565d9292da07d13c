//! Anatomy tokens and the job plan.
//!
//! The anatomy describes the project and shot being packed as a flat token
//! map. Documents may nest one level (`{"folder": {"name": "sh010"}}`); nested
//! keys are flattened to `folder[name]` so templates can address them.

use std::path::Path;

use chrono::Utc;
use regex::Regex;
use rusty_pack_common::{expand_template, join_posix, to_absolute, to_posix_path, TokenMap};
use serde::Serialize;
use serde_json::Value;

use crate::error::SettingsError;
use crate::settings::JobSettings;

/// Token naming the place a package is sent from.
pub const PLACE_SOURCE_TOKEN: &str = "place_source";
/// Token naming the place a package is sent to.
pub const PLACE_TARGET_TOKEN: &str = "place_target";
/// Token holding the pack timestamp.
pub const TIMESTAMP_TOKEN: &str = "timestamp";

/// Flat token map describing the project being packed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anatomy {
    tokens: TokenMap,
}

impl Anatomy {
    /// Create an empty anatomy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anatomy from already flat tokens.
    pub fn from_tokens(tokens: TokenMap) -> Self {
        Self { tokens }
    }

    /// Add a token.
    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Flatten a JSON anatomy document.
    ///
    /// Scalars are stringified. Objects contribute `key[subkey]` tokens for
    /// their scalar members; deeper nesting and arrays are ignored.
    ///
    /// # Errors
    /// Returns error if the document is not a JSON object.
    pub fn from_json_value(document: &Value) -> Result<Self, SettingsError> {
        let Value::Object(entries) = document else {
            return Err(SettingsError::InvalidAnatomy {
                reason: "anatomy must be a JSON object".to_string(),
            });
        };

        let mut tokens: TokenMap = TokenMap::new();
        for (key, value) in entries {
            match value {
                Value::Object(members) => {
                    for (member, member_value) in members {
                        if let Some(text) = scalar_to_string(member_value) {
                            tokens.insert(format!("{}[{}]", key, member), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_to_string(other) {
                        tokens.insert(key.clone(), text);
                    }
                }
            }
        }
        Ok(Self { tokens })
    }

    /// Parse and flatten a JSON anatomy document.
    ///
    /// # Errors
    /// Returns error if the string is not a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_json_value(&document)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tokens.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(String::as_str)
    }

    pub fn tokens(&self) -> &TokenMap {
        &self.tokens
    }

    /// Expand a template against the anatomy.
    pub fn expand(&self, template: &str) -> String {
        expand_template(template, &self.tokens)
    }

    /// The `timestamp` token, or the current UTC time when it is not set.
    pub fn timestamp(&self) -> String {
        match self.get(TIMESTAMP_TOKEN) {
            Some(value) => value.to_string(),
            None => Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Where the package goes and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPlan {
    /// Expanded job folder name.
    pub name: String,
    /// Absolute directory holding the job folder.
    pub root: String,
    /// `root/name`.
    pub destination: String,
    /// Set when the name does not follow the naming convention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_warning: Option<String>,
}

impl JobPlan {
    /// Expand the job settings against the anatomy.
    ///
    /// A name that does not match `job_name_check` only produces a warning.
    /// A relative job root is made absolute against the working directory.
    ///
    /// # Errors
    /// Returns error if the job root cannot be made absolute.
    pub fn resolve(settings: &JobSettings, anatomy: &Anatomy) -> Result<Self, SettingsError> {
        let name: String = anatomy.expand(&settings.job_name_default);
        let root: String = anatomy.expand(&settings.job_root);
        let root: String = to_absolute(Path::new(&root))
            .map(|p| to_posix_path(&p))
            .map_err(|e| SettingsError::InvalidAnatomy {
                reason: e.to_string(),
            })?;

        let name_warning: Option<String> = check_name(&name, &settings.job_name_check);
        if let Some(warning) = &name_warning {
            log::warn!("{}", warning);
        }

        let destination: String = join_posix(&[root.as_str(), name.as_str()]);
        Ok(Self {
            name,
            root,
            destination,
            name_warning,
        })
    }

    /// Add the `job`, `job[name]` and `job[root]` tokens to an anatomy.
    pub fn apply(&self, anatomy: &mut Anatomy) {
        anatomy.insert("job", self.name.clone());
        anatomy.insert("job[name]", self.name.clone());
        anatomy.insert("job[root]", self.root.clone());
    }

    /// Make a template-expanded path absolute: relative paths are placed
    /// under the job root.
    pub fn place(&self, path: &str) -> String {
        if Path::new(path).is_absolute() || path.starts_with('/') {
            path.to_string()
        } else {
            join_posix(&[self.root.as_str(), path])
        }
    }
}

/// Check a job name against the naming convention (anchored at the start).
fn check_name(name: &str, pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(&format!("^(?:{})", pattern)) {
        Ok(regex) if regex.is_match(name) => None,
        Ok(_) => Some(format!(
            "Job name '{}' does not match the naming convention '{}'",
            name, pattern
        )),
        Err(e) => Some(format!("Invalid job name check '{}': {}", pattern, e)),
    }
}
