//! Shared constants used across rusty-pack crates.

/// Placeholders that expand to one path per declared view.
pub const VIEW_PLACEHOLDERS: [&str; 2] = ["%v", "%V"];

/// File extensions treated as font files when found in a file parameter.
pub const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Extension of reusable node definitions found on the plugin path.
pub const REUSABLE_NODE_EXTENSION: &str = ".gizmo";

/// Native plugin library extensions reported as custom plugins.
pub const PLUGIN_LIBRARY_EXTENSIONS: [&str; 4] = [".dll", ".so", ".dylib", ".pdb"];

/// Host expression yielding the path of the project file being evaluated.
pub const DEFAULT_CURRENT_FILE_EXPRESSION: &str = "[value root.name]";

/// Buffer size used when streaming files through the hasher (64KB).
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Name of the built-in category used when none are configured.
pub const DEFAULT_CATEGORY_NAME: &str = "default_category";
