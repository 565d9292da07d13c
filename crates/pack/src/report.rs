//! Pack manifest.
//!
//! The report lists every packed resource, one row per canonical record, and
//! the outcome of the copy and relink phases. It is written as pretty JSON
//! once before copying and rewritten when the run finishes.

use rusty_pack_common::{combine_hashes, format_size, parent_dir};
use rusty_pack_filesystem::FileSystemError;
use serde::Serialize;

use crate::anatomy::{Anatomy, JobPlan, PLACE_SOURCE_TOKEN, PLACE_TARGET_TOKEN};
use crate::error::PackError;
use crate::record::{RecordId, ResourceKind, ResourceRecord};

/// One packed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub kind: ResourceKind,
    pub categories: Vec<String>,
    /// Colorspace of the owning node (media only).
    pub color_info: Option<String>,
    pub node_class: String,
    pub node_name: String,
    pub file_name: String,
    pub extension: String,
    pub total_size: u64,
    pub disabled: bool,
    pub disconnected: bool,
    pub original_path: String,
    /// Hash over the content hashes of every file.
    pub content_hash: String,
    pub file_count: usize,
    pub place_source: String,
    pub place_target: String,
    pub timestamp: String,
}

impl ReportRow {
    /// Build the row of a record.
    pub fn from_record(record: &ResourceRecord, anatomy: &Anatomy, timestamp: &str) -> Self {
        let hashes: Vec<&str> = record.files.iter().map(|f| f.hash.as_str()).collect();
        Self {
            kind: record.kind,
            categories: record.categories.clone(),
            color_info: match record.kind {
                ResourceKind::Media => record.color_info.clone(),
                _ => None,
            },
            node_class: record.node_class.clone(),
            node_name: record.node_name.clone(),
            file_name: record.display_name().to_string(),
            extension: record.extension().to_string(),
            total_size: record.total_size(),
            disabled: record.flags.disabled,
            disconnected: record.flags.disconnected,
            original_path: record.source_pattern.clone(),
            content_hash: combine_hashes(&hashes),
            file_count: record.files.len(),
            place_source: anatomy.get(PLACE_SOURCE_TOKEN).unwrap_or_default().to_string(),
            place_target: anatomy.get(PLACE_TARGET_TOKEN).unwrap_or_default().to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

/// A record's files copied to one category destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedSet {
    pub record: RecordId,
    pub node_name: String,
    pub category: String,
    pub destination: String,
    pub file_count: usize,
    pub bytes: u64,
    /// Whether the files went through the bulk copy command.
    pub bulk: bool,
}

/// A copy that failed. The run continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyIssue {
    pub record: RecordId,
    pub source: String,
    pub destination: String,
    pub message: String,
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CopyIssue {
    /// Describe a failed copy.
    pub fn from_error(
        record: RecordId,
        source: impl Into<String>,
        destination: impl Into<String>,
        error: &FileSystemError,
    ) -> Self {
        let (return_code, stdout, stderr): (Option<i32>, String, String) = match error {
            FileSystemError::CopyCommandFailed {
                return_code,
                stdout,
                stderr,
                ..
            } => (*return_code, stdout.clone(), stderr.clone()),
            _ => (None, String::new(), String::new()),
        };
        Self {
            record,
            source: source.into(),
            destination: destination.into(),
            message: error.to_string(),
            return_code,
            stdout,
            stderr,
        }
    }
}

/// A project reference rewritten in a saved project output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelinkedReference {
    pub script: String,
    pub record: RecordId,
    pub node: String,
    pub parameter: String,
    pub value: String,
}

/// A saved project output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedScript {
    pub kind: String,
    pub path: String,
    pub relinked: usize,
}

/// The complete pack manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackReport {
    pub job: JobPlan,
    pub rows: Vec<ReportRow>,
    pub total_size: u64,
    pub total_size_human: String,
    pub copied: Vec<CopiedSet>,
    pub relinked: Vec<RelinkedReference>,
    pub scripts: Vec<SavedScript>,
    pub plugins: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<CopyIssue>,
}

impl PackReport {
    /// Create an empty report for a job.
    pub fn new(job: JobPlan) -> Self {
        Self {
            job,
            rows: Vec::new(),
            total_size: 0,
            total_size_human: format_size(0),
            copied: Vec::new(),
            relinked: Vec::new(),
            scripts: Vec::new(),
            plugins: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Rebuild the rows from the records.
    ///
    /// Duplicates get no row. Uncategorized records that exist on disk get a
    /// row only when `include_uncategorized` is set; missing records always
    /// get one.
    pub fn set_rows(&mut self, records: &[ResourceRecord], anatomy: &Anatomy, include_uncategorized: bool) {
        let timestamp: String = anatomy.timestamp();
        self.rows = records
            .iter()
            .filter(|r| !r.is_duplicate())
            .filter(|r| r.is_categorized() || r.is_missing() || include_uncategorized)
            .map(|r| ReportRow::from_record(r, anatomy, &timestamp))
            .collect();
        self.total_size = self.rows.iter().map(|r| r.total_size).sum();
        self.total_size_human = format_size(self.total_size);
    }

    /// Rows of resources that could not be found.
    pub fn missing_rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.file_count == 0)
    }

    /// Write the report as pretty JSON, creating the parent directory.
    ///
    /// # Errors
    /// Returns error if the report cannot be serialized or written.
    pub fn write(&self, path: &str) -> Result<(), PackError> {
        let content: String = serde_json::to_string_pretty(self)?;
        let parent: &str = parent_dir(path);
        if !parent.is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PackError::ReportWrite {
                path: path.to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| PackError::ReportWrite {
            path: path.to_string(),
            source: e,
        })?;
        log::info!("Report written to {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OwnerRef;
    use crate::record::{ConcreteFile, NodeFlags};
    use crate::settings::JobSettings;
    use rusty_pack_filesystem::ResolvedPath;
    use tempfile::TempDir;

    fn record(id: RecordId, files: usize, categories: &[&str]) -> ResourceRecord {
        let concrete: Vec<ConcreteFile> = (0..files)
            .map(|i| ConcreteFile {
                path: format!("/src/plate.{:04}.exr", 1001 + i),
                size: 100,
                hash: format!("h{}", i),
            })
            .collect();
        let resolved: ResolvedPath = ResolvedPath {
            path: "/src/plate.####.exr".to_string(),
            ..ResolvedPath::default()
        };
        let mut record: ResourceRecord = ResourceRecord::new(
            id,
            ResourceKind::Media,
            OwnerRef::new(format!("Read{}", id), "file"),
            "Read",
            NodeFlags::default(),
        )
        .with_source("/src/plate.####.exr", resolved, concrete);
        record.categories = categories.iter().map(|s| s.to_string()).collect();
        record.color_info = Some("ACES - ACEScg".to_string());
        record
    }

    fn anatomy() -> Anatomy {
        Anatomy::new()
            .with_token(PLACE_SOURCE_TOKEN, "studio")
            .with_token(PLACE_TARGET_TOKEN, "vendor")
            .with_token("timestamp", "2024-05-30T10:23:06Z")
    }

    fn job() -> JobPlan {
        JobPlan::resolve(
            &JobSettings {
                job_name_default: "Pack".to_string(),
                job_name_check: String::new(),
                job_root: "/out".to_string(),
            },
            &Anatomy::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_row_fields() {
        let row: ReportRow = ReportRow::from_record(&record(0, 2, &["plates"]), &anatomy(), "now");

        assert_eq!(row.file_name, "plate.####.exr");
        assert_eq!(row.extension, "exr");
        assert_eq!(row.total_size, 200);
        assert_eq!(row.file_count, 2);
        assert_eq!(row.place_source, "studio");
        assert_eq!(row.place_target, "vendor");
        assert_eq!(row.color_info.as_deref(), Some("ACES - ACEScg"));
        assert_eq!(row.content_hash.len(), 32);
    }

    #[test]
    fn test_row_field_order() {
        let row: ReportRow = ReportRow::from_record(&record(0, 1, &["plates"]), &anatomy(), "now");
        let json: String = serde_json::to_string(&row).unwrap();
        let order: Vec<usize> = [
            "\"kind\"",
            "\"categories\"",
            "\"color_info\"",
            "\"node_class\"",
            "\"node_name\"",
            "\"file_name\"",
            "\"extension\"",
            "\"total_size\"",
            "\"disabled\"",
            "\"disconnected\"",
            "\"original_path\"",
            "\"content_hash\"",
            "\"file_count\"",
            "\"place_source\"",
            "\"place_target\"",
            "\"timestamp\"",
        ]
        .iter()
        .map(|field| json.find(field).unwrap())
        .collect();

        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_row_selection() {
        let mut records: Vec<ResourceRecord> = vec![
            record(0, 2, &["plates"]),
            record(1, 2, &["plates"]),
            record(2, 1, &[]),
            record(3, 0, &[]),
        ];
        records[1].duplicate_of = Some(0);
        let mut report: PackReport = PackReport::new(job());

        report.set_rows(&records, &anatomy(), true);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.total_size, 300);
        assert_eq!(report.missing_rows().count(), 1);

        report.set_rows(&records, &anatomy(), false);
        let nodes: Vec<&str> = report.rows.iter().map(|r| r.node_name.as_str()).collect();
        assert_eq!(nodes, vec!["Read0", "Read3"]);
    }

    #[test]
    fn test_copy_issue_from_command_failure() {
        let error: FileSystemError = FileSystemError::CopyCommandFailed {
            program: "rsync".to_string(),
            return_code: Some(23),
            stdout: "partial".to_string(),
            stderr: "denied".to_string(),
        };
        let issue: CopyIssue = CopyIssue::from_error(4, "/src", "/dst", &error);

        assert_eq!(issue.return_code, Some(23));
        assert_eq!(issue.stdout, "partial");
        assert_eq!(issue.stderr, "denied");
        assert!(issue.message.contains("rsync"));
    }

    #[test]
    fn test_write_creates_directories() {
        let dir: TempDir = TempDir::new().unwrap();
        let path: String = format!("{}/job/report.json", dir.path().display());
        let mut report: PackReport = PackReport::new(job());
        report.set_rows(&[record(0, 1, &["plates"])], &anatomy(), true);

        report.write(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["rows"][0]["node_name"], "Read0");
        assert_eq!(written["job"]["name"], "Pack");
    }
}
