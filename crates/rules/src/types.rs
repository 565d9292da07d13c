//! Category rule data structures.
//!
//! Categories are read from the `categories` section of the pack settings. The
//! section is an ordered JSON object, and categories are evaluated in document
//! order, so [`CategoryRules`] deserializes it into a `Vec` instead of a map.

use std::fmt;

use rusty_pack_common::DEFAULT_CATEGORY_NAME;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// What a filter is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterSource {
    /// File name of the first concrete file.
    #[serde(rename = "File Name")]
    FileName,
    /// Full path of the first concrete file.
    #[serde(rename = "File Path", alias = "Full Path")]
    FilePath,
    /// Class of the owning node.
    #[serde(rename = "Node Class")]
    NodeClass,
}

/// How the results of a category's filters are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CombineMode {
    /// Every filter must match.
    #[default]
    And,
    /// At least one filter must match.
    Or,
}

impl TryFrom<String> for CombineMode {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(RuleError::InvalidCombineMode { value }),
        }
    }
}

impl From<CombineMode> for String {
    fn from(mode: CombineMode) -> Self {
        match mode {
            CombineMode::And => "AND".to_string(),
            CombineMode::Or => "OR".to_string(),
        }
    }
}

/// A single classification filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub source: FilterSource,
    /// Regex for file sources; whitespace separated class names for `Node Class`.
    pub search: String,
    /// Allow-list for the first capture group. Empty means any hit matches.
    #[serde(default)]
    pub check: Vec<String>,
    /// Token receiving the captured value.
    pub token_name: String,
    #[serde(default)]
    pub invert: bool,
}

/// Node state switches and the filter combination mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default = "default_true")]
    pub skip_disconnected: bool,
    #[serde(default = "default_true")]
    pub skip_disabled: bool,
    #[serde(default)]
    pub combine_filters: CombineMode,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            skip_disconnected: true,
            skip_disabled: true,
            combine_filters: CombineMode::And,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Destination templates for copy and relink.
///
/// The copy destination is `root_template/top_folder`, the value written back
/// into the project is `root_template_relink/top_folder_relink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPaths {
    pub root_template: String,
    pub root_template_relink: String,
    #[serde(default)]
    pub top_folder: String,
    #[serde(default)]
    pub top_folder_relink: String,
}

impl Default for CategoryPaths {
    fn default() -> Self {
        let template: String = "{job}/{folder[name]}/{category}".to_string();
        Self {
            root_template: template.clone(),
            root_template_relink: template.clone(),
            top_folder: template.clone(),
            top_folder_relink: template,
        }
    }
}

/// A category as written in the settings document. Absent parts inherit the
/// default category's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub path: Option<CategoryPaths>,
    #[serde(default)]
    pub filter_options: Option<FilterOptions>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
}

/// A resolved, named category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
    pub paths: CategoryPaths,
    pub options: FilterOptions,
    pub filters: Vec<Filter>,
}

impl Category {
    /// Resolve a configured category, filling absent parts from the default
    /// category.
    ///
    /// # Arguments
    /// * `name` - Category name (the key in the settings document)
    /// * `config` - The configured parts
    pub fn from_config(name: impl Into<String>, config: CategoryConfig) -> Self {
        let fallback: Category = default_category();
        let filters: Vec<Filter> = match config.filters {
            Some(filters) if !filters.is_empty() => filters,
            _ => fallback.filters,
        };
        Self {
            name: name.into(),
            paths: config.path.unwrap_or(fallback.paths),
            options: config.filter_options.unwrap_or(fallback.options),
            filters,
        }
    }
}

/// The built-in category used when none are configured.
///
/// Accepts any file with a 2 to 4 character extension and captures the
/// extension into the `extension` token.
pub fn default_category() -> Category {
    Category {
        name: DEFAULT_CATEGORY_NAME.to_string(),
        paths: CategoryPaths::default(),
        options: FilterOptions::default(),
        filters: vec![Filter {
            source: FilterSource::FileName,
            search: r".*\.(\w{2,4})$".to_string(),
            check: Vec::new(),
            token_name: "extension".to_string(),
            invert: false,
        }],
    }
}

/// Ordered list of configured categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryRules {
    categories: Vec<Category>,
}

impl CategoryRules {
    /// Create rules from resolved categories.
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Categories as configured, in order.
    pub fn configured(&self) -> &[Category] {
        &self.categories
    }

    /// Categories to evaluate: the configured ones, or the default category
    /// when none are configured.
    pub fn effective(&self) -> Vec<Category> {
        if self.categories.is_empty() {
            vec![default_category()]
        } else {
            self.categories.clone()
        }
    }

    /// Look up a configured category by name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }
}

impl<'de> Deserialize<'de> for CategoryRules {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = CategoryRules;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of category name to category settings")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut categories: Vec<Category> = Vec::new();
                while let Some((name, config)) = map.next_entry::<String, CategoryConfig>()? {
                    categories.push(Category::from_config(name, config));
                }
                Ok(CategoryRules { categories })
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}
