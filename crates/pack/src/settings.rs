//! Pack settings document.
//!
//! Settings are a nested JSON object. Every section is optional and falls back
//! to the defaults documented on each field. Script output sections accept
//! both the short field names (`copy`, `path`, ...) and the long prefixed
//! names used by existing settings files (`nuke_scripts_package_copy`, ...).

use std::path::Path;

use rusty_pack_rules::{CategoryPaths, CategoryRules};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

fn default_true() -> bool {
    true
}

/// Job naming and location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Template for the job folder name. Default: `{project[name]}_pack`.
    #[serde(default = "JobSettings::default_name")]
    pub job_name_default: String,
    /// Regex the expanded job name should match. Empty disables the check.
    #[serde(default)]
    pub job_name_check: String,
    /// Template for the directory holding job folders.
    /// Default: `{project[name]}/out/pack`.
    #[serde(default = "JobSettings::default_root")]
    pub job_root: String,
}

impl JobSettings {
    fn default_name() -> String {
        "{project[name]}_pack".to_string()
    }

    fn default_root() -> String {
        "{project[name]}/out/pack".to_string()
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            job_name_default: Self::default_name(),
            job_name_check: String::new(),
            job_root: Self::default_root(),
        }
    }
}

/// One saved copy of the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutputSettings {
    /// Whether this copy is saved at all.
    #[serde(
        default,
        alias = "nuke_scripts_source_copy",
        alias = "nuke_scripts_package_copy",
        alias = "nuke_scripts_target_copy"
    )]
    pub copy: bool,
    /// Where the copy is saved (template).
    #[serde(
        default,
        alias = "nuke_scripts_source_path",
        alias = "nuke_scripts_package_path",
        alias = "nuke_scripts_target_path"
    )]
    pub path: String,
    /// Where the copy will live once delivered (template). Relative links are
    /// computed from this file's directory for the target output.
    #[serde(
        default,
        alias = "nuke_scripts_package_path_relink",
        alias = "nuke_scripts_target_path_relink"
    )]
    pub path_relink: String,
    /// Whether resource links are written relative to the saved file.
    #[serde(
        default,
        alias = "nuke_scripts_package_relative",
        alias = "nuke_scripts_target_relative"
    )]
    pub relative: bool,
}

/// The three project outputs of a pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSettings {
    /// Untouched copy of the source project.
    #[serde(default, alias = "nuke_scripts_source")]
    pub source: ScriptOutputSettings,
    /// Copy linking to the package as copied at the source place.
    #[serde(default, alias = "nuke_scripts_package")]
    pub package: ScriptOutputSettings,
    /// Copy linking to the package as seen at the target place.
    #[serde(default, alias = "nuke_scripts_target")]
    pub target: ScriptOutputSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSettings {
    /// Compute content hashes during scan. Default: `true`.
    #[serde(default = "default_true")]
    pub hashes_generate: bool,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            hashes_generate: true,
        }
    }
}

/// Settings for a resource kind with a single fixed destination
/// (fonts, reusable nodes, color configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub paths: CategoryPaths,
    #[serde(default = "default_true")]
    pub skip_disconnected: bool,
    #[serde(default = "default_true")]
    pub skip_disabled: bool,
    /// Reusable nodes only: convert the nodes to plain groups in the relinked
    /// project outputs.
    #[serde(default)]
    pub to_groups: bool,
    /// Color configuration only: pack every file below the configuration
    /// directory, keeping the structure.
    #[serde(default)]
    pub subfolders: bool,
}

impl ResourceSection {
    /// A section packing into `{job}/{folder[name]}/<folder>`.
    pub fn named(folder: &str) -> Self {
        let root: String = format!("{{job}}/{{folder[name]}}/{}", folder);
        Self {
            enabled: true,
            paths: CategoryPaths {
                root_template: root.clone(),
                root_template_relink: root,
                top_folder: String::new(),
                top_folder_relink: String::new(),
            },
            skip_disconnected: true,
            skip_disabled: true,
            to_groups: false,
            subfolders: false,
        }
    }

    fn fonts() -> Self {
        Self::named("fonts")
    }

    fn gizmos() -> Self {
        Self::named("gizmos")
    }

    fn ocio() -> Self {
        Self {
            subfolders: true,
            ..Self::named("ocio")
        }
    }
}

/// External bulk copy tool for frame sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySettings {
    /// Program and argument templates; `{source_dir}`, `{target_dir}` and
    /// `{pattern}` are substituted per sequence. Empty copies file by file.
    #[serde(default)]
    pub bulk_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Report location (template).
    /// Default: `{job[root]}/{job[name]}/{job[name]}_report.json`.
    #[serde(default = "ReportSettings::default_path")]
    pub path: String,
    /// Whether present resources matching no category get a report row.
    /// Missing resources are always reported. Default: `true`.
    #[serde(default = "default_true")]
    pub include_uncategorized: bool,
}

impl ReportSettings {
    fn default_path() -> String {
        "{job[root]}/{job[name]}/{job[name]}_report.json".to_string()
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            include_uncategorized: true,
        }
    }
}

/// Complete settings for one pack profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackSettings {
    #[serde(default)]
    pub job: JobSettings,
    #[serde(default, rename = "nuke_scripts", alias = "scripts")]
    pub scripts: ScriptSettings,
    #[serde(default)]
    pub hashes: HashSettings,
    #[serde(default)]
    pub categories: CategoryRules,
    #[serde(default = "ResourceSection::fonts")]
    pub fonts: ResourceSection,
    #[serde(default = "ResourceSection::gizmos")]
    pub gizmos: ResourceSection,
    #[serde(default = "ResourceSection::ocio")]
    pub ocio: ResourceSection,
    #[serde(default)]
    pub copy: CopySettings,
    #[serde(default)]
    pub report: ReportSettings,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            job: JobSettings::default(),
            scripts: ScriptSettings::default(),
            hashes: HashSettings::default(),
            categories: CategoryRules::default(),
            fonts: ResourceSection::fonts(),
            gizmos: ResourceSection::gizmos(),
            ocio: ResourceSection::ocio(),
            copy: CopySettings::default(),
            report: ReportSettings::default(),
        }
    }
}

impl PackSettings {
    /// Parse settings from a JSON string.
    ///
    /// # Errors
    /// Returns error if the document is not valid settings JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let content: String = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Read one named profile from a document mapping profile names to
    /// settings.
    ///
    /// # Arguments
    /// * `json` - Document of the form `{"<profile>": {...settings...}, ...}`
    /// * `profile` - Profile to pick; `None` picks the first one
    ///
    /// # Returns
    /// The picked profile name and its settings, or `None` if the profile is
    /// not present.
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON or the picked profile
    /// is not valid settings.
    pub fn profile_from_json_str(
        json: &str,
        profile: Option<&str>,
    ) -> Result<Option<(String, Self)>, SettingsError> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let picked: Option<(&String, &serde_json::Value)> = match profile {
            Some(name) => document.get_key_value(name),
            None => document.iter().next(),
        };
        match picked {
            Some((name, value)) => {
                let settings: PackSettings = PackSettings::deserialize(value)?;
                Ok(Some((name.clone(), settings)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_pack_rules::CombineMode;
    use tempfile::TempDir;

    const VENDOR_PROFILE: &str = r#"{
        "job": {
            "job_name_default": "Pack_{yyyy}-{mm}-{dd}_v000",
            "job_name_check": "Pack_20\\d\\d-\\d\\d-\\d\\d_v\\d\\d\\d",
            "job_root": "{project[name]}/out/pack"
        },
        "nuke_scripts": {
            "nuke_scripts_source": {
                "nuke_scripts_source_copy": true,
                "nuke_scripts_source_path": "{job[root]}/{job[name]}/{script_name}_source.nk"
            },
            "nuke_scripts_target": {
                "nuke_scripts_target_copy": true,
                "nuke_scripts_target_path": "{job[root]}/{job[name]}/{script_name}.nk",
                "nuke_scripts_target_path_relink": "/vendor/{folder[name]}/nuke/{script_name}.nk",
                "nuke_scripts_target_relative": true
            }
        },
        "hashes": {"hashes_generate": false},
        "categories": {
            "plates": {
                "path": {
                    "root_template": "{job}/{folder[name]}/{category}",
                    "root_template_relink": "/vendor/{folder[name]}/{category}"
                },
                "filter_options": {
                    "skip_disconnected": false,
                    "skip_disabled": true,
                    "combine_filters": "OR"
                },
                "filters": [
                    {"source": "File Name", "search": ".*\\.(\\w{2,4})$", "check": ["exr"], "token_name": "extension", "invert": false}
                ]
            }
        },
        "gizmos": {
            "enabled": true,
            "root_template": "{job}/{folder[name]}/gizmos",
            "root_template_relink": "/vendor/{folder[name]}/gizmos",
            "to_groups": true
        },
        "copy": {"bulk_command": ["rsync", "-a", "{source_dir}/", "{target_dir}/"]}
    }"#;

    #[test]
    fn test_parse_full_profile() {
        let settings: PackSettings = PackSettings::from_json_str(VENDOR_PROFILE).unwrap();

        assert_eq!(settings.job.job_root, "{project[name]}/out/pack");
        assert!(settings.scripts.source.copy);
        assert!(!settings.scripts.package.copy);
        assert!(settings.scripts.target.relative);
        assert_eq!(
            settings.scripts.target.path_relink,
            "/vendor/{folder[name]}/nuke/{script_name}.nk"
        );
        assert!(!settings.hashes.hashes_generate);

        let plates = settings.categories.get("plates").unwrap();
        assert_eq!(plates.options.combine_filters, CombineMode::Or);
        assert_eq!(plates.paths.top_folder, "");

        assert!(settings.gizmos.to_groups);
        assert!(settings.gizmos.skip_disabled);
        assert_eq!(settings.copy.bulk_command.len(), 4);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let settings: PackSettings = PackSettings::from_json_str("{}").unwrap();

        assert_eq!(settings, PackSettings::default());
        assert!(settings.hashes.hashes_generate);
        assert!(settings.report.include_uncategorized);
        assert!(settings.ocio.subfolders);
        assert_eq!(settings.fonts.paths.root_template, "{job}/{folder[name]}/fonts");
        assert!(settings.categories.configured().is_empty());
    }

    #[test]
    fn test_invalid_document() {
        let result = PackSettings::from_json_str(r#"{"hashes": {"hashes_generate": "yes"}}"#);
        assert!(matches!(result, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir: TempDir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, VENDOR_PROFILE).unwrap();

        let settings: PackSettings = PackSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.categories.configured().len(), 1);

        let missing = PackSettings::from_json_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SettingsError::Io { .. })));
    }

    #[test]
    fn test_profile_selection() {
        let document: String = format!(r#"{{"toVendor": {}, "toClient": {{}}}}"#, VENDOR_PROFILE);

        let (name, settings) = PackSettings::profile_from_json_str(&document, None)
            .unwrap()
            .unwrap();
        assert_eq!(name, "toVendor");
        assert!(settings.gizmos.to_groups);

        let (name, settings) = PackSettings::profile_from_json_str(&document, Some("toClient"))
            .unwrap()
            .unwrap();
        assert_eq!(name, "toClient");
        assert_eq!(settings, PackSettings::default());

        assert!(PackSettings::profile_from_json_str(&document, Some("other"))
            .unwrap()
            .is_none());
    }
}
