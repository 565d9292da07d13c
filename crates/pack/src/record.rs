//! Resource records: one per file-bearing reference found in the project.

use rusty_pack_common::{file_extension, file_name, TokenMap};
use rusty_pack_filesystem::ResolvedPath;
use serde::Serialize;

use crate::host::OwnerRef;

/// Index of a record in its run.
pub type RecordId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Media,
    Font,
    ReusableNode,
    ColorConfig,
}

impl ResourceKind {
    /// Fixed category of kinds that are not classified by rules.
    pub fn fixed_category(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Media => None,
            ResourceKind::Font => Some("fonts"),
            ResourceKind::ReusableNode => Some("gizmos"),
            ResourceKind::ColorConfig => Some("ocio"),
        }
    }
}

/// A file that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConcreteFile {
    pub path: String,
    pub size: u64,
    /// Content hash; empty when hashing is disabled.
    pub hash: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeFlags {
    pub disabled: bool,
    pub disconnected: bool,
}

/// Destinations of a record for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSet {
    pub category: String,
    /// Absolute copy directory.
    pub template: String,
    /// Directory the project links to after delivery.
    pub template_relink: String,
    /// Copy destination per concrete file.
    pub copy: Vec<String>,
    /// Delivered location per concrete file.
    pub relink: Vec<String>,
}

/// Family and style of a font resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontFace {
    pub family: String,
    pub style: String,
    pub index: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: RecordId,
    pub kind: ResourceKind,
    pub owner: OwnerRef,
    pub node_name: String,
    pub node_class: String,
    /// Path as stored in the project.
    pub source_pattern: String,
    pub resolved: ResolvedPath,
    /// Existing files, empty when the resource is missing.
    pub files: Vec<ConcreteFile>,
    pub flags: NodeFlags,
    pub categories: Vec<String>,
    pub tokens: TokenMap,
    pub duplicate_of: Option<RecordId>,
    pub targets: Vec<TargetSet>,
    pub color_info: Option<String>,
    pub font: Option<FontFace>,
}

impl ResourceRecord {
    /// Create a record with no source, classification or targets yet.
    pub fn new(
        id: RecordId,
        kind: ResourceKind,
        owner: OwnerRef,
        node_class: impl Into<String>,
        flags: NodeFlags,
    ) -> Self {
        Self {
            id,
            kind,
            node_name: owner.node.clone(),
            owner,
            node_class: node_class.into(),
            source_pattern: String::new(),
            resolved: ResolvedPath::default(),
            files: Vec::new(),
            flags,
            categories: Vec::new(),
            tokens: TokenMap::new(),
            duplicate_of: None,
            targets: Vec::new(),
            color_info: None,
            font: None,
        }
    }

    /// Attach the stored path, its resolution and the files found.
    pub fn with_source(
        mut self,
        source_pattern: impl Into<String>,
        resolved: ResolvedPath,
        files: Vec<ConcreteFile>,
    ) -> Self {
        self.source_pattern = source_pattern.into();
        self.resolved = resolved;
        self.files = files;
        self
    }

    pub fn is_missing(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    pub fn is_categorized(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Whether the files are copied as one frame sequence.
    pub fn is_sequence(&self) -> bool {
        self.kind == ResourceKind::Media && self.resolved.is_sequence() && self.files.len() > 1
    }

    pub fn first_file(&self) -> Option<&str> {
        self.files.first().map(|f| f.path.as_str())
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// File name shown for the record: the stored name, with frame
    /// placeholders kept.
    pub fn display_name(&self) -> &str {
        file_name(&self.resolved.path)
    }

    pub fn extension(&self) -> &str {
        file_extension(&self.resolved.path)
    }

    /// Target of the first assigned category, used for relinking.
    pub fn primary_target(&self) -> Option<&TargetSet> {
        self.targets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(path: &str, files: &[&str]) -> ResolvedPath {
        ResolvedPath {
            files: files.iter().map(|s| s.to_string()).collect(),
            used_project_root: false,
            filter: path.to_string(),
            path: path.to_string(),
            frame: rusty_pack_filesystem::FrameSpec::detect(file_name(path)),
        }
    }

    #[test]
    fn test_sequence_requires_several_files() {
        let files: Vec<ConcreteFile> = ["/a/p.1001.exr", "/a/p.1002.exr"]
            .iter()
            .map(|p| ConcreteFile {
                path: p.to_string(),
                size: 10,
                hash: String::new(),
            })
            .collect();
        let record: ResourceRecord = ResourceRecord::new(
            0,
            ResourceKind::Media,
            OwnerRef::new("Read1", "file"),
            "Read",
            NodeFlags::default(),
        )
        .with_source(
            "/a/p.####.exr",
            resolved("/a/p.####.exr", &["/a/p.1001.exr", "/a/p.1002.exr"]),
            files.clone(),
        );
        assert!(record.is_sequence());
        assert_eq!(record.total_size(), 20);
        assert_eq!(record.display_name(), "p.####.exr");
        assert_eq!(record.extension(), "exr");

        let single: ResourceRecord = ResourceRecord::new(
            1,
            ResourceKind::Media,
            OwnerRef::new("Read2", "file"),
            "Read",
            NodeFlags::default(),
        )
        .with_source(
            "/a/p.####.exr",
            resolved("/a/p.####.exr", &["/a/p.1001.exr"]),
            files[..1].to_vec(),
        );
        assert!(!single.is_sequence());
    }

    #[test]
    fn test_fixed_categories() {
        assert_eq!(ResourceKind::Media.fixed_category(), None);
        assert_eq!(ResourceKind::Font.fixed_category(), Some("fonts"));
        assert_eq!(ResourceKind::ReusableNode.fixed_category(), Some("gizmos"));
        assert_eq!(ResourceKind::ColorConfig.fixed_category(), Some("ocio"));
    }
}
