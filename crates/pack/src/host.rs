//! The project host: the application owning the node graph being packed.
//!
//! The pipeline never touches the graph directly. It reads nodes and their
//! file-bearing parameters through [`ProjectHost`] and writes relinked values
//! back through the same trait. [`MemoryHost`] describes a project as plain
//! data and is used by tests and by callers driving the engine from a file.

use std::collections::HashMap;

use rusty_pack_common::{parent_dir, DEFAULT_CURRENT_FILE_EXPRESSION};
use rusty_pack_filesystem::PathEvaluator;
use serde::{Deserialize, Serialize};

use crate::error::{HostError, SettingsError};

/// Identifies the parameter a resource was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub node: String,
    /// Parameter name; empty for resources owned by the node itself.
    pub parameter: String,
}

impl OwnerRef {
    pub fn new(node: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            parameter: parameter.into(),
        }
    }

    /// A reference to the node itself rather than one of its parameters.
    pub fn node(node: impl Into<String>) -> Self {
        Self::new(node, "")
    }
}

/// Value of a file-bearing parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterValue {
    /// A path, possibly with view or frame placeholders and expressions.
    File { path: String },
    /// A font selected by family and style.
    Font { family: String, style: String },
    /// Color management configuration. Only the `custom` mode points to a
    /// configuration file of its own.
    ColorConfig { mode: String, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostParameter {
    pub name: String,
    pub value: ParameterValue,
}

/// A node of the project graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNode {
    /// Fully qualified node name.
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub disabled: bool,
    /// Names of the nodes feeding this node.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Names of the nodes fed by this node.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Whether the node is an instance of a reusable node definition found
    /// on the plugin path.
    #[serde(default)]
    pub reusable: bool,
    /// Working colorspace of the node, if it has one.
    #[serde(default)]
    pub colorspace: Option<String>,
    #[serde(default)]
    pub parameters: Vec<HostParameter>,
}

impl HostNode {
    /// Create a node with no connections and no parameters.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            disabled: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            reusable: false,
            colorspace: None,
            parameters: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.push(HostParameter {
            name: name.into(),
            value,
        });
        self
    }

    /// Add a file parameter.
    pub fn with_file(self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.with_parameter(name, ParameterValue::File { path: path.into() })
    }

    /// Connect an output to another node.
    pub fn with_output(mut self, node: impl Into<String>) -> Self {
        self.outputs.push(node.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// A node with neither inputs nor outputs.
    pub fn is_disconnected(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// An installed font known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontInfo {
    pub family: String,
    pub style: String,
    pub path: String,
    /// Face index inside the font file.
    #[serde(default)]
    pub index: u32,
}

/// Host application adapter.
pub trait ProjectHost {
    /// Every node of the project, groups already recursed into.
    fn nodes(&self) -> Vec<HostNode>;

    /// Names of the views declared in the project.
    fn views(&self) -> Vec<String>;

    /// Evaluate embedded expressions in a string.
    ///
    /// # Errors
    /// Returns error if the string cannot be evaluated.
    fn evaluate(&self, text: &str) -> Result<String, HostError>;

    /// Project directory relative paths are stored against.
    fn project_directory(&self) -> Option<String>;

    /// Path of the project file, `None` for an unsaved project.
    fn project_path(&self) -> Option<String>;

    /// Directories searched for reusable node definitions, in order.
    fn plugin_paths(&self) -> Vec<String>;

    /// Fonts known to the host.
    fn fonts(&self) -> Vec<FontInfo>;

    /// Paths of every plugin currently loaded.
    fn loaded_plugins(&self) -> Vec<String>;

    /// Installation directory of the host application.
    fn install_dir(&self) -> Option<String>;

    /// Read a parameter value.
    ///
    /// # Errors
    /// Returns error if the node or parameter does not exist.
    fn read_parameter(&self, owner: &OwnerRef) -> Result<ParameterValue, HostError>;

    /// Write a parameter value.
    ///
    /// # Errors
    /// Returns error if the node or parameter does not exist.
    fn write_parameter(&mut self, owner: &OwnerRef, value: ParameterValue)
        -> Result<(), HostError>;

    /// Replace a reusable node instance by an equivalent plain group.
    ///
    /// # Errors
    /// Returns error if the node cannot be converted.
    fn convert_to_group(&mut self, node: &str) -> Result<(), HostError>;

    /// Save the project under a new path.
    ///
    /// # Errors
    /// Returns error if the project cannot be written.
    fn save_project(&mut self, path: &str) -> Result<(), HostError>;

    /// Expression evaluating to the path of the project file at load time.
    fn current_file_expression(&self) -> String {
        DEFAULT_CURRENT_FILE_EXPRESSION.to_string()
    }
}

/// Exposes a host to the sequence resolver.
pub struct HostEvaluator<'a, H: ProjectHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: ProjectHost + ?Sized> HostEvaluator<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }
}

impl<H: ProjectHost + ?Sized> PathEvaluator for HostEvaluator<'_, H> {
    fn views(&self) -> Vec<String> {
        self.host.views()
    }

    fn evaluate(&self, text: &str) -> Option<String> {
        match self.host.evaluate(text) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        }
    }

    fn project_directory(&self) -> Option<String> {
        self.host.project_directory()
    }
}

/// A project saved by [`MemoryHost::save_project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedProject {
    pub path: String,
    pub nodes: Vec<HostNode>,
}

/// In-memory project host.
///
/// Expressions are evaluated by substituting the entries of `expressions`;
/// any `[...]` left afterwards is an evaluation failure. Saving writes the
/// node list as JSON to the requested path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryHost {
    #[serde(default)]
    pub nodes: Vec<HostNode>,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub expressions: HashMap<String, String>,
    #[serde(default)]
    pub project_directory: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub plugin_paths: Vec<String>,
    #[serde(default)]
    pub fonts: Vec<FontInfo>,
    #[serde(default)]
    pub loaded_plugins: Vec<String>,
    #[serde(default)]
    pub install_dir: Option<String>,
    #[serde(skip)]
    saved: Vec<SavedProject>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a project from a JSON document.
    ///
    /// # Errors
    /// Returns error if the document does not describe a project.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_node(mut self, node: HostNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_project_path(mut self, path: impl Into<String>) -> Self {
        let path: String = path.into();
        if self.project_directory.is_none() {
            self.project_directory = Some(parent_dir(&path).to_string());
        }
        self.project_path = Some(path);
        self
    }

    pub fn node(&self, name: &str) -> Option<&HostNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Projects saved so far, in order.
    pub fn saved_projects(&self) -> &[SavedProject] {
        &self.saved
    }

    fn parameter_mut(&mut self, owner: &OwnerRef) -> Result<&mut ParameterValue, HostError> {
        let node: &mut HostNode = self
            .nodes
            .iter_mut()
            .find(|n| n.name == owner.node)
            .ok_or_else(|| HostError::UnknownNode {
                node: owner.node.clone(),
            })?;
        node.parameters
            .iter_mut()
            .find(|p| p.name == owner.parameter)
            .map(|p| &mut p.value)
            .ok_or_else(|| HostError::UnknownParameter {
                node: owner.node.clone(),
                parameter: owner.parameter.clone(),
            })
    }
}

impl ProjectHost for MemoryHost {
    fn nodes(&self) -> Vec<HostNode> {
        self.nodes.clone()
    }

    fn views(&self) -> Vec<String> {
        self.views.clone()
    }

    fn evaluate(&self, text: &str) -> Result<String, HostError> {
        let evaluated: String = self
            .expressions
            .iter()
            .fold(text.to_string(), |acc, (expression, value)| {
                acc.replace(expression.as_str(), value)
            });
        match (evaluated.find('['), evaluated.rfind(']')) {
            (Some(open), Some(close)) if open < close => Err(HostError::Evaluation {
                text: text.to_string(),
                reason: format!("unknown expression {}", &evaluated[open..=close]),
            }),
            _ => Ok(evaluated),
        }
    }

    fn project_directory(&self) -> Option<String> {
        self.project_directory.clone()
    }

    fn project_path(&self) -> Option<String> {
        self.project_path.clone()
    }

    fn plugin_paths(&self) -> Vec<String> {
        self.plugin_paths.clone()
    }

    fn fonts(&self) -> Vec<FontInfo> {
        self.fonts.clone()
    }

    fn loaded_plugins(&self) -> Vec<String> {
        self.loaded_plugins.clone()
    }

    fn install_dir(&self) -> Option<String> {
        self.install_dir.clone()
    }

    fn read_parameter(&self, owner: &OwnerRef) -> Result<ParameterValue, HostError> {
        let node: &HostNode = self.node(&owner.node).ok_or_else(|| HostError::UnknownNode {
            node: owner.node.clone(),
        })?;
        node.parameter(&owner.parameter)
            .cloned()
            .ok_or_else(|| HostError::UnknownParameter {
                node: owner.node.clone(),
                parameter: owner.parameter.clone(),
            })
    }

    fn write_parameter(
        &mut self,
        owner: &OwnerRef,
        value: ParameterValue,
    ) -> Result<(), HostError> {
        *self.parameter_mut(owner)? = value;
        Ok(())
    }

    fn convert_to_group(&mut self, node: &str) -> Result<(), HostError> {
        let target: &mut HostNode = self
            .nodes
            .iter_mut()
            .find(|n| n.name == node)
            .ok_or_else(|| HostError::UnknownNode {
                node: node.to_string(),
            })?;
        if !target.reusable {
            return Err(HostError::GroupConversion {
                node: node.to_string(),
                reason: format!("{} is not a reusable node", target.class),
            });
        }
        target.class = "Group".to_string();
        target.reusable = false;
        Ok(())
    }

    fn save_project(&mut self, path: &str) -> Result<(), HostError> {
        let save_error = |reason: String| HostError::Save {
            path: path.to_string(),
            reason,
        };
        let parent: &str = parent_dir(path);
        if !parent.is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        let content: String =
            serde_json::to_string_pretty(&self.nodes).map_err(|e| save_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_error(e.to_string()))?;

        self.saved.push(SavedProject {
            path: path.to_string(),
            nodes: self.nodes.clone(),
        });
        Ok(())
    }
}
