//! Shot packaging engine.
//!
//! Collects every external resource a compositing project references, sorts
//! the resources into categories, copies them into a self-contained package
//! and saves project copies whose references point into the package.
//!
//! A pack runs as a fixed sequence of steps on a [`PackRun`]:
//! - `scan()` - Build one [`ResourceRecord`] per referenced resource
//! - `classify()` - Assign categories and tokens
//! - `deduplicate()` - Link records sharing identical content
//! - `template()` - Expand copy and relink destinations
//! - `write_report()` - Write the manifest
//! - `copy()` - Copy canonical records into the package
//! - `relink()` - Save project copies with rewritten references
//! - `finish()` - Rewrite the manifest with the outcomes
//!
//! The project itself is reached through the [`ProjectHost`] trait;
//! [`MemoryHost`] is an in-memory implementation backed by JSON.

pub mod anatomy;
pub mod dedup;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod progress;
pub mod record;
pub mod report;
pub mod scan;
pub mod settings;
pub mod targets;

// Re-export main types
pub use anatomy::{Anatomy, JobPlan, PLACE_SOURCE_TOKEN, PLACE_TARGET_TOKEN, TIMESTAMP_TOKEN};
pub use dedup::mark_duplicates;
pub use error::{HostError, PackError, SettingsError};
pub use host::{
    FontInfo, HostEvaluator, HostNode, HostParameter, MemoryHost, OwnerRef, ParameterValue,
    ProjectHost, SavedProject,
};
pub use orchestrator::{
    CopySummary, PackRun, Phase, ScriptDestination, ScriptKind, ScriptOutput, SCRIPT_NAME_TOKEN,
};
pub use progress::{NoProgress, PackProgress, ProgressCallback};
pub use record::{
    ConcreteFile, FontFace, NodeFlags, RecordId, ResourceKind, ResourceRecord, TargetSet,
};
pub use report::{CopiedSet, CopyIssue, PackReport, RelinkedReference, ReportRow, SavedScript};
pub use scan::{custom_plugins, ProjectScanner, ScanOptions, ScanResult, CUSTOM_COLOR_MODE};
pub use settings::{
    CopySettings, HashSettings, JobSettings, PackSettings, ReportSettings, ResourceSection,
    ScriptOutputSettings, ScriptSettings,
};
pub use targets::{link_path, LinkSide, TargetPlanner};
