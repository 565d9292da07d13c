//! Project scan: turns host nodes into resource records.

use std::path::Path;

use rusty_pack_common::{
    file_extension, file_name, format_size, join_posix, parent_dir, relative_path, to_posix_path,
    to_posix_str, ContentHasher, SkipHashing, Xxh3ContentHasher, FONT_EXTENSIONS,
    PLUGIN_LIBRARY_EXTENSIONS, REUSABLE_NODE_EXTENSION,
};
use rusty_pack_filesystem::{ResolvedPath, SequenceResolver};
use walkdir::WalkDir;

use crate::host::{FontInfo, HostEvaluator, HostNode, OwnerRef, ParameterValue, ProjectHost};
use crate::record::{ConcreteFile, FontFace, NodeFlags, RecordId, ResourceKind, ResourceRecord};

/// Color management mode that points to a configuration file of its own.
pub const CUSTOM_COLOR_MODE: &str = "custom";

/// Options controlling a scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Compute content hashes of every concrete file.
    pub generate_hashes: bool,
    /// Pack every file below a custom color configuration's directory.
    pub color_config_subfolders: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            generate_hashes: true,
            color_config_subfolders: true,
        }
    }
}

/// Records and plugin information found in a project.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Records in discovery order; `records[i].id == i`.
    pub records: Vec<ResourceRecord>,
    /// Loaded plugin libraries that do not ship with the host.
    pub custom_plugins: Vec<String>,
}

/// Walks the host's nodes and builds resource records.
pub struct ProjectScanner {
    options: ScanOptions,
    hasher: Box<dyn ContentHasher>,
}

impl ProjectScanner {
    /// Create a scanner. Hashing uses XXH3 when enabled.
    pub fn new(options: ScanOptions) -> Self {
        let hasher: Box<dyn ContentHasher> = if options.generate_hashes {
            Box::new(Xxh3ContentHasher)
        } else {
            Box::new(SkipHashing)
        };
        Self { options, hasher }
    }

    /// Scan every node of the project.
    ///
    /// Never fails: unreadable or missing files produce missing records.
    pub fn scan<H: ProjectHost + ?Sized>(&self, host: &H) -> ScanResult {
        let evaluator: HostEvaluator<'_, H> = HostEvaluator::new(host);
        let resolver: SequenceResolver<'_> = SequenceResolver::new(&evaluator);
        let fonts: Vec<FontInfo> = host.fonts();
        let plugin_paths: Vec<String> = host.plugin_paths();
        let nodes: Vec<HostNode> = host.nodes();

        let mut records: Vec<ResourceRecord> = Vec::new();
        for node in &nodes {
            let flags: NodeFlags = NodeFlags {
                disabled: node.disabled,
                disconnected: node.is_disconnected(),
            };

            if node.reusable {
                let record: ResourceRecord =
                    self.reusable_node_record(records.len(), node, flags, &plugin_paths, &resolver);
                records.push(record);
            }

            for parameter in &node.parameters {
                let owner: OwnerRef = OwnerRef::new(&node.name, &parameter.name);
                let record: Option<ResourceRecord> = match &parameter.value {
                    ParameterValue::File { path } => {
                        self.file_record(records.len(), owner, node, flags, path, &fonts, &resolver)
                    }
                    ParameterValue::Font { family, style } => Some(self.font_face_record(
                        records.len(),
                        owner,
                        node,
                        flags,
                        family,
                        style,
                        &fonts,
                        &resolver,
                    )),
                    ParameterValue::ColorConfig { mode, path } => {
                        self.color_config_record(records.len(), owner, node, flags, mode, path, &resolver)
                    }
                };
                records.extend(record);
            }
        }

        let custom_plugins: Vec<String> =
            custom_plugins(&host.loaded_plugins(), host.install_dir().as_deref());

        let missing: usize = records.iter().filter(|r| r.is_missing()).count();
        let total: u64 = records.iter().map(|r| r.total_size()).sum();
        log::info!(
            "Scanned {} nodes: {} resources ({} missing), {} on disk, {} custom plugins",
            nodes.len(),
            records.len(),
            missing,
            format_size(total),
            custom_plugins.len()
        );

        ScanResult {
            records,
            custom_plugins,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn file_record(
        &self,
        id: RecordId,
        owner: OwnerRef,
        node: &HostNode,
        flags: NodeFlags,
        path: &str,
        fonts: &[FontInfo],
        resolver: &SequenceResolver<'_>,
    ) -> Option<ResourceRecord> {
        if path.trim().is_empty() {
            return None;
        }
        let resolved: ResolvedPath = resolver.resolve(path);
        let files: Vec<ConcreteFile> = self.concrete_files(&resolved.files);
        let extension: String = file_extension(path).to_ascii_lowercase();

        if FONT_EXTENSIONS.contains(&extension.as_str()) {
            let face: Option<FontFace> = resolved
                .files
                .first()
                .and_then(|found| fonts.iter().find(|f| to_posix_str(&f.path) == *found))
                .map(|f| FontFace {
                    family: f.family.clone(),
                    style: f.style.clone(),
                    index: Some(f.index),
                });
            let mut record: ResourceRecord =
                ResourceRecord::new(id, ResourceKind::Font, owner, &node.class, flags)
                    .with_source(path, resolved, files);
            record.font = face;
            return Some(record);
        }

        let mut record: ResourceRecord =
            ResourceRecord::new(id, ResourceKind::Media, owner, &node.class, flags)
                .with_source(path, resolved, files);
        record.color_info = node.colorspace.clone();
        if record.is_missing() {
            log::debug!("{}: no files found for {}", record.node_name, path);
        }
        Some(record)
    }

    #[allow(clippy::too_many_arguments)]
    fn font_face_record(
        &self,
        id: RecordId,
        owner: OwnerRef,
        node: &HostNode,
        flags: NodeFlags,
        family: &str,
        style: &str,
        fonts: &[FontInfo],
        resolver: &SequenceResolver<'_>,
    ) -> ResourceRecord {
        let known: Option<&FontInfo> = fonts
            .iter()
            .find(|f| f.family == family && f.style == style);
        let resolved: ResolvedPath = match known {
            Some(font) => resolver.resolve(&font.path),
            None => {
                log::warn!("{}: font {} {} is not installed", owner.node, family, style);
                ResolvedPath::default()
            }
        };
        let files: Vec<ConcreteFile> = self.concrete_files(&resolved.files);
        let mut record: ResourceRecord =
            ResourceRecord::new(id, ResourceKind::Font, owner, &node.class, flags).with_source(
                format!("{} {}", family, style),
                resolved,
                files,
            );
        record.font = Some(FontFace {
            family: family.to_string(),
            style: style.to_string(),
            index: known.map(|f| f.index),
        });
        record
    }

    fn reusable_node_record(
        &self,
        id: RecordId,
        node: &HostNode,
        flags: NodeFlags,
        plugin_paths: &[String],
        resolver: &SequenceResolver<'_>,
    ) -> ResourceRecord {
        let definition: String = if node.class.ends_with(REUSABLE_NODE_EXTENSION) {
            node.class.clone()
        } else {
            format!("{}{}", node.class, REUSABLE_NODE_EXTENSION)
        };
        let found: Option<String> = plugin_paths
            .iter()
            .map(|dir| join_posix(&[to_posix_str(dir), definition.clone()]))
            .find(|candidate| Path::new(candidate).is_file());

        let resolved: ResolvedPath = match &found {
            Some(path) => resolver.resolve(path),
            None => {
                log::warn!("{}: {} not found on the plugin path", node.name, definition);
                ResolvedPath {
                    path: definition.clone(),
                    ..ResolvedPath::default()
                }
            }
        };
        let files: Vec<ConcreteFile> = self.concrete_files(&resolved.files);
        ResourceRecord::new(
            id,
            ResourceKind::ReusableNode,
            OwnerRef::node(&node.name),
            &node.class,
            flags,
        )
        .with_source(definition, resolved, files)
    }

    #[allow(clippy::too_many_arguments)]
    fn color_config_record(
        &self,
        id: RecordId,
        owner: OwnerRef,
        node: &HostNode,
        flags: NodeFlags,
        mode: &str,
        path: &str,
        resolver: &SequenceResolver<'_>,
    ) -> Option<ResourceRecord> {
        if mode != CUSTOM_COLOR_MODE || path.trim().is_empty() {
            log::debug!("{}: color management mode '{}' has nothing to pack", owner.node, mode);
            return None;
        }
        let resolved: ResolvedPath = resolver.resolve(path);
        let paths: Vec<String> = match resolved.files.first() {
            Some(config) if self.options.color_config_subfolders => {
                let config_dir: &str = parent_dir(config);
                if is_filesystem_root(config_dir) {
                    log::warn!(
                        "{}: {} is at the filesystem root, packing the configuration file only",
                        owner.node,
                        config
                    );
                    resolved.files.clone()
                } else {
                    config_directory_files(config_dir)
                }
            }
            _ => resolved.files.clone(),
        };
        let files: Vec<ConcreteFile> = self.concrete_files(&paths);
        Some(
            ResourceRecord::new(id, ResourceKind::ColorConfig, owner, &node.class, flags)
                .with_source(path, resolved, files),
        )
    }

    /// Stat and hash existing files. Files that vanished are dropped.
    fn concrete_files(&self, paths: &[String]) -> Vec<ConcreteFile> {
        paths
            .iter()
            .filter_map(|path| {
                let size: u64 = match std::fs::metadata(path) {
                    Ok(metadata) => metadata.len(),
                    Err(e) => {
                        log::warn!("Cannot stat {}: {}", path, e);
                        return None;
                    }
                };
                let hash: String = match self.hasher.hash_file(Path::new(path)) {
                    Ok(hash) => hash,
                    Err(e) => {
                        log::warn!("Cannot hash {}: {}", path, e);
                        String::new()
                    }
                };
                Some(ConcreteFile {
                    path: path.clone(),
                    size,
                    hash,
                })
            })
            .collect()
    }
}

fn is_filesystem_root(dir: &str) -> bool {
    Path::new(dir).parent().is_none()
}

/// Every file below a color configuration directory, sorted by path.
fn config_directory_files(dir: &str) -> Vec<String> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Cannot read color configuration directory {}: {}", dir, e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| to_posix_path(entry.path()))
        .collect()
}

/// Loaded plugin libraries that do not live in the host's install directory.
pub fn custom_plugins(loaded: &[String], install_dir: Option<&str>) -> Vec<String> {
    loaded
        .iter()
        .map(|p| to_posix_str(p))
        .filter(|p| {
            let name: &str = file_name(p);
            PLUGIN_LIBRARY_EXTENSIONS.iter().any(|ext| name.contains(ext))
        })
        .filter(|p| match install_dir {
            Some(dir) if !dir.is_empty() => !relative_path(p, dir).is_within_root(),
            _ => true,
        })
        .collect()
}
