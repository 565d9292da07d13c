//! Pack run state machine.
//!
//! A [`PackRun`] owns everything one pack needs: settings, anatomy, job plan,
//! records and the report. Its steps must run in order:
//!
//! ```text
//! Ready -> Scanned -> Classified -> Deduplicated -> Templated
//!       -> Reported -> Copied -> Relinked -> Finished
//! ```
//!
//! Calling a step out of order fails with [`PackError::InvalidPhase`]. A run
//! is never resumed; a failed pack starts again from a fresh run.

use std::collections::HashSet;

use rusty_pack_common::{
    file_name, format_size, parent_dir, relative_path, RelativePath, VIEW_PLACEHOLDERS,
};
use rusty_pack_filesystem::{CommandCopier, Copier, FsCopier, SequenceCopy};
use rusty_pack_rules::{Classification, Classifier, ClassifySubject};
use serde::Serialize;

use crate::anatomy::{Anatomy, JobPlan, TIMESTAMP_TOKEN};
use crate::dedup::mark_duplicates;
use crate::error::PackError;
use crate::host::{OwnerRef, ParameterValue, ProjectHost};
use crate::progress::{PackProgress, ProgressCallback};
use crate::record::{RecordId, ResourceKind, ResourceRecord, TargetSet};
use crate::report::{CopiedSet, CopyIssue, PackReport, RelinkedReference, SavedScript};
use crate::scan::{ProjectScanner, ScanOptions, ScanResult};
use crate::settings::{PackSettings, ResourceSection, ScriptOutputSettings};
use crate::targets::{link_path, LinkSide, TargetPlanner};

/// Token holding the project file name without extension.
pub const SCRIPT_NAME_TOKEN: &str = "script_name";

/// Step of a pack run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Phase {
    Ready,
    Scanned,
    Classified,
    Deduplicated,
    Templated,
    Reported,
    Copied,
    Relinked,
    Finished,
}

/// Which project output a saved copy is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// Untouched copy of the source project.
    Source,
    /// Links to the package at the source place.
    Package,
    /// Links to the package at the target place.
    Target,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Source => "source",
            ScriptKind::Package => "package",
            ScriptKind::Target => "target",
        }
    }
}

/// What the references of a saved project point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptDestination {
    /// References are left as they are.
    Original,
    /// References point to the copied files.
    Copy,
    /// References point to the files as delivered.
    Relink,
}

/// One project output to save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOutput {
    pub kind: ScriptKind,
    /// Where the project is saved.
    pub save_path: String,
    /// Directory relative links are computed from.
    pub link_root: String,
    pub destination: ScriptDestination,
    pub relative: bool,
}

impl ScriptOutput {
    /// Build the enabled project outputs from the settings, in save order.
    ///
    /// # Arguments
    /// * `source` / `package` / `target` - Output settings
    /// * `anatomy` - Anatomy with job and script name tokens applied
    /// * `job` - Job plan; relative save paths are placed under its root
    pub fn from_settings(
        source: &ScriptOutputSettings,
        package: &ScriptOutputSettings,
        target: &ScriptOutputSettings,
        anatomy: &Anatomy,
        job: &JobPlan,
    ) -> Vec<ScriptOutput> {
        let mut outputs: Vec<ScriptOutput> = Vec::new();
        let entries = [
            (ScriptKind::Source, source, ScriptDestination::Original),
            (ScriptKind::Package, package, ScriptDestination::Copy),
            (ScriptKind::Target, target, ScriptDestination::Relink),
        ];
        for (kind, settings, destination) in entries {
            if !settings.copy || settings.path.is_empty() {
                continue;
            }
            let save_path: String = job.place(&anatomy.expand(&settings.path));
            let link_root: String = match destination {
                ScriptDestination::Relink if !settings.path_relink.is_empty() => {
                    parent_dir(&anatomy.expand(&settings.path_relink)).to_string()
                }
                _ => parent_dir(&save_path).to_string(),
            };
            outputs.push(ScriptOutput {
                kind,
                save_path,
                link_root,
                destination,
                relative: settings.relative && destination != ScriptDestination::Original,
            });
        }
        outputs
    }

    fn link_side(&self) -> Option<LinkSide> {
        match self.destination {
            ScriptDestination::Original => None,
            ScriptDestination::Copy => Some(LinkSide::Copy),
            ScriptDestination::Relink => Some(LinkSide::Relink),
        }
    }

    /// The value written for a link: absolute, or relative to the link root.
    ///
    /// Relative links inside the link root are plain relative paths; links
    /// outside it become an expression ascending from the saved project.
    fn link_value(&self, path: &str, current_file: &str) -> String {
        if !self.relative {
            return path.to_string();
        }
        let relative: RelativePath = relative_path(path, &self.link_root);
        if relative.is_within_root() {
            relative.path
        } else {
            relative.to_expression(current_file)
        }
    }
}

/// Totals of the copy phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub records: usize,
    pub files: usize,
    pub bytes: u64,
    pub issues: usize,
}

/// Context of one pack run.
pub struct PackRun {
    settings: PackSettings,
    anatomy: Anatomy,
    job: JobPlan,
    classifier: Classifier,
    scan_options: ScanOptions,
    records: Vec<ResourceRecord>,
    /// Records with at least one failed copy.
    failed: HashSet<RecordId>,
    report: PackReport,
    phase: Phase,
}

impl PackRun {
    /// Start a run.
    ///
    /// Resolves the job plan, adds the job tokens to the anatomy and compiles
    /// the category rules. The timestamp is fixed here unless the anatomy
    /// provides one, so every manifest of the run carries the same value.
    /// Naming problems and invalid filter patterns are recorded as report
    /// warnings.
    ///
    /// # Errors
    /// Returns error if the job root cannot be resolved.
    pub fn new(settings: PackSettings, mut anatomy: Anatomy) -> Result<Self, PackError> {
        let job: JobPlan = JobPlan::resolve(&settings.job, &anatomy)?;
        job.apply(&mut anatomy);
        if anatomy.get(TIMESTAMP_TOKEN).is_none() {
            let timestamp: String = anatomy.timestamp();
            anatomy.insert(TIMESTAMP_TOKEN, timestamp);
        }

        let classifier: Classifier = Classifier::from_rules(&settings.categories);
        let scan_options: ScanOptions = ScanOptions {
            generate_hashes: settings.hashes.hashes_generate,
            color_config_subfolders: settings.ocio.subfolders,
        };

        let mut report: PackReport = PackReport::new(job.clone());
        report.warnings.extend(job.name_warning.clone());
        report
            .warnings
            .extend(classifier.compile_errors().iter().map(|e| e.to_string()));

        Ok(Self {
            settings,
            anatomy,
            job,
            classifier,
            scan_options,
            records: Vec::new(),
            failed: HashSet::new(),
            report,
            phase: Phase::Ready,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn report(&self) -> &PackReport {
        &self.report
    }

    pub fn into_report(self) -> PackReport {
        self.report
    }

    pub fn job(&self) -> &JobPlan {
        &self.job
    }

    pub fn anatomy(&self) -> &Anatomy {
        &self.anatomy
    }

    /// Absolute report location from the report path template.
    pub fn report_path(&self) -> String {
        self.job.place(&self.anatomy.expand(&self.settings.report.path))
    }

    fn enter(&mut self, operation: &'static str, expected: Phase, next: Phase) -> Result<(), PackError> {
        if self.phase != expected {
            return Err(PackError::InvalidPhase {
                operation,
                current: self.phase,
                expected,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Build records from the host's nodes.
    ///
    /// Adds the `script_name` token from the project path unless the anatomy
    /// already defines it.
    ///
    /// # Errors
    /// Returns error if called out of order.
    pub fn scan<H: ProjectHost + ?Sized>(&mut self, host: &H) -> Result<(), PackError> {
        self.enter("scan", Phase::Ready, Phase::Scanned)?;

        if self.anatomy.get(SCRIPT_NAME_TOKEN).is_none() {
            let script_name: String = host
                .project_path()
                .map(|p| file_stem(&p).to_string())
                .unwrap_or_else(|| "untitled".to_string());
            self.anatomy.insert(SCRIPT_NAME_TOKEN, script_name);
        }

        let result: ScanResult = ProjectScanner::new(self.scan_options).scan(host);
        self.records = result.records;
        self.report.plugins = result.custom_plugins;
        Ok(())
    }

    /// Assign categories and tokens.
    ///
    /// Media records are matched against the category rules. Fonts, reusable
    /// nodes and color configurations get their fixed category when their
    /// section is enabled and the node is not skipped.
    ///
    /// # Errors
    /// Returns error if called out of order.
    pub fn classify(&mut self) -> Result<(), PackError> {
        self.enter("classify", Phase::Scanned, Phase::Classified)?;

        for record in &mut self.records {
            match record.kind {
                ResourceKind::Media => {
                    let subject: ClassifySubject<'_> = ClassifySubject {
                        node_name: &record.node_name,
                        node_class: &record.node_class,
                        first_file: record.files.first().map(|f| f.path.as_str()),
                        disabled: record.flags.disabled,
                        disconnected: record.flags.disconnected,
                    };
                    let classification: Classification = self.classifier.classify(&subject);
                    record.categories = classification.categories;
                    record.tokens = classification.tokens;
                }
                ResourceKind::Font => {
                    assign_fixed(record, &self.settings.fonts, true);
                }
                ResourceKind::ReusableNode => {
                    assign_fixed(record, &self.settings.gizmos, true);
                }
                ResourceKind::ColorConfig => {
                    assign_fixed(record, &self.settings.ocio, false);
                }
            }
            if !record.is_categorized() {
                log::debug!("{}: no category for {}", record.node_name, record.source_pattern);
            }
        }

        let categorized: usize = self.records.iter().filter(|r| r.is_categorized()).count();
        log::info!("Classified {} of {} resources", categorized, self.records.len());
        Ok(())
    }

    /// Link duplicate records to their canonical record.
    ///
    /// # Returns
    /// Number of duplicates found.
    ///
    /// # Errors
    /// Returns error if called out of order.
    pub fn deduplicate(&mut self) -> Result<usize, PackError> {
        self.enter("deduplicate", Phase::Classified, Phase::Deduplicated)?;
        let duplicates: usize = mark_duplicates(&mut self.records);
        log::info!("Found {} duplicate resources", duplicates);
        Ok(duplicates)
    }

    /// Expand copy and relink destinations.
    ///
    /// # Errors
    /// Returns error if called out of order.
    pub fn template(&mut self) -> Result<(), PackError> {
        self.enter("template", Phase::Deduplicated, Phase::Templated)?;
        let planner: TargetPlanner<'_> = TargetPlanner::new(&self.anatomy, &self.job, &self.settings);
        let planned: usize = planner.plan_all(&mut self.records);
        log::info!("Planned destinations for {} resources", planned);
        Ok(())
    }

    /// Write the manifest before copying.
    ///
    /// # Errors
    /// Returns error if called out of order or the report cannot be written.
    pub fn write_report(&mut self, path: &str) -> Result<(), PackError> {
        self.enter("write_report", Phase::Templated, Phase::Reported)?;
        self.report.set_rows(
            &self.records,
            &self.anatomy,
            self.settings.report.include_uncategorized,
        );
        self.report.write(path)
    }

    /// Copy every canonical record to each of its targets.
    ///
    /// Frame sequences go through [`Copier::copy_sequence`] when a bulk copy
    /// command is configured; everything else is copied file by file.
    /// Failures are collected in the report and copying continues.
    ///
    /// # Arguments
    /// * `copier` - Copy service
    /// * `progress` - Notified after each record; returning `false` stops
    ///   the phase before the next record
    ///
    /// # Errors
    /// Returns error if called out of order, or [`PackError::Cancelled`].
    pub fn copy(
        &mut self,
        copier: &dyn Copier,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<CopySummary, PackError> {
        self.enter("copy", Phase::Reported, Phase::Copied)?;

        let queue: Vec<RecordId> = self
            .records
            .iter()
            .filter(|r| !r.is_duplicate() && !r.targets.is_empty())
            .map(|r| r.id)
            .collect();
        let bytes_total: u64 = queue
            .iter()
            .map(|&id| self.records[id].total_size() * self.records[id].targets.len() as u64)
            .sum();
        let bulk: bool = !self.settings.copy.bulk_command.is_empty();

        let mut summary: CopySummary = CopySummary::default();
        for (index, &id) in queue.iter().enumerate() {
            let record: &ResourceRecord = &self.records[id];
            for target in &record.targets {
                let (copied, issues): (Option<CopiedSet>, Vec<CopyIssue>) =
                    if bulk && can_bulk_copy(record) {
                        copy_sequence(copier, record, target)
                    } else {
                        copy_files(copier, record, target)
                    };
                for issue in &issues {
                    log::error!(
                        "Copy failed for {}: {} -> {}: {}",
                        record.node_name,
                        issue.source,
                        issue.destination,
                        issue.message
                    );
                }
                summary.issues += issues.len();
                if !issues.is_empty() {
                    self.failed.insert(id);
                }
                self.report.errors.extend(issues);
                if let Some(copied) = copied {
                    summary.files += copied.file_count;
                    summary.bytes += copied.bytes;
                    self.report.copied.push(copied);
                }
            }
            summary.records += 1;

            if let Some(callback) = progress {
                let update: PackProgress = PackProgress {
                    records_done: index + 1,
                    records_total: queue.len(),
                    node_name: record.node_name.clone(),
                    bytes_copied: summary.bytes,
                    bytes_total,
                };
                if !callback.on_progress(&update) && index + 1 < queue.len() {
                    log::warn!("Copy cancelled after {} of {} resources", index + 1, queue.len());
                    return Err(PackError::Cancelled {
                        completed: index + 1,
                        total: queue.len(),
                    });
                }
            }
        }

        log::info!(
            "Copied {} files ({}) for {} resources, {} failures",
            summary.files,
            format_size(summary.bytes),
            summary.records,
            summary.issues
        );
        Ok(summary)
    }

    /// Save the configured project outputs.
    ///
    /// For each output, every resource reference is rewritten to its new
    /// location (duplicates use their canonical record's location), the
    /// project is saved, and the original values are restored. Missing and
    /// uncategorized resources keep their original reference, and so do
    /// resources whose copy failed (with a report warning). Reusable nodes
    /// are converted to groups before the first relinked save when
    /// `gizmos.to_groups` is set; conversions are not undone.
    ///
    /// # Errors
    /// Returns error if called out of order or the host rejects a parameter
    /// write or a save.
    pub fn relink<H: ProjectHost + ?Sized>(&mut self, host: &mut H) -> Result<(), PackError> {
        self.enter("relink", Phase::Copied, Phase::Relinked)?;

        let outputs: Vec<ScriptOutput> = ScriptOutput::from_settings(
            &self.settings.scripts.source,
            &self.settings.scripts.package,
            &self.settings.scripts.target,
            &self.anatomy,
            &self.job,
        );
        let current_file: String = host.current_file_expression();

        let mut originals: Vec<(RecordId, OwnerRef, ParameterValue)> = Vec::new();
        for record in &self.records {
            if record.owner.parameter.is_empty() {
                continue;
            }
            let value: ParameterValue = host.read_parameter(&record.owner)?;
            originals.push((record.id, record.owner.clone(), value));
        }

        let mut converted: HashSet<String> = HashSet::new();
        let mut kept: HashSet<RecordId> = HashSet::new();
        for output in &outputs {
            let mut relinked: usize = 0;

            if let Some(side) = output.link_side() {
                if self.settings.gizmos.to_groups {
                    self.convert_reusable_nodes(host, &mut converted);
                }

                for (id, owner, original) in &originals {
                    let canonical: &ResourceRecord = self.canonical(*id);
                    if self.failed.contains(&canonical.id) {
                        if kept.insert(*id) {
                            let warning: String = format!(
                                "{}: copy failed, keeping the original reference",
                                owner.node
                            );
                            log::warn!("{}", warning);
                            self.report.warnings.push(warning);
                        }
                        continue;
                    }
                    let Some(path) = link_path(canonical, side) else {
                        continue;
                    };
                    let value: String = output.link_value(&path, &current_file);
                    let rewritten: ParameterValue = match original {
                        ParameterValue::File { .. } => ParameterValue::File {
                            path: value.clone(),
                        },
                        ParameterValue::ColorConfig { mode, .. } => ParameterValue::ColorConfig {
                            mode: mode.clone(),
                            path: value.clone(),
                        },
                        ParameterValue::Font { .. } => continue,
                    };
                    host.write_parameter(owner, rewritten)?;
                    relinked += 1;
                    self.report.relinked.push(RelinkedReference {
                        script: output.kind.as_str().to_string(),
                        record: *id,
                        node: owner.node.clone(),
                        parameter: owner.parameter.clone(),
                        value,
                    });
                }
            }

            host.save_project(&output.save_path)?;
            log::info!(
                "Saved {} project to {} ({} references relinked)",
                output.kind.as_str(),
                output.save_path,
                relinked
            );
            self.report.scripts.push(SavedScript {
                kind: output.kind.as_str().to_string(),
                path: output.save_path.clone(),
                relinked,
            });

            if relinked > 0 {
                for (_, owner, original) in &originals {
                    host.write_parameter(owner, original.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Rewrite the manifest with the copy and relink outcomes.
    ///
    /// # Errors
    /// Returns error if called out of order or the report cannot be written.
    pub fn finish(&mut self, path: &str) -> Result<(), PackError> {
        self.enter("finish", Phase::Relinked, Phase::Finished)?;
        self.report.set_rows(
            &self.records,
            &self.anatomy,
            self.settings.report.include_uncategorized,
        );
        self.report.write(path)
    }

    /// Run every step against a host.
    ///
    /// Copies with the configured bulk copy command, or in-process when none
    /// is configured, and writes the report to [`PackRun::report_path`].
    ///
    /// # Errors
    /// Returns the first error that aborts the run.
    pub fn execute<H: ProjectHost + ?Sized>(
        mut self,
        host: &mut H,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<PackReport, PackError> {
        self.scan(&*host)?;
        self.classify()?;
        self.deduplicate()?;
        self.template()?;

        let report_path: String = self.report_path();
        self.write_report(&report_path)?;

        let copier: Box<dyn Copier> = match CommandCopier::from_argv(&self.settings.copy.bulk_command) {
            Some(command) => {
                log::info!("Copying sequences with {}", command.program());
                Box::new(command)
            }
            None => Box::new(FsCopier),
        };
        self.copy(copier.as_ref(), progress)?;
        self.relink(host)?;
        self.finish(&report_path)?;
        Ok(self.into_report())
    }

    fn canonical(&self, id: RecordId) -> &ResourceRecord {
        let record: &ResourceRecord = &self.records[id];
        match record.duplicate_of {
            Some(first) => &self.records[first],
            None => record,
        }
    }

    fn convert_reusable_nodes<H: ProjectHost + ?Sized>(
        &mut self,
        host: &mut H,
        converted: &mut HashSet<String>,
    ) {
        for record in &self.records {
            if record.kind != ResourceKind::ReusableNode || !record.is_categorized() {
                continue;
            }
            if !converted.insert(record.node_name.clone()) {
                continue;
            }
            if let Err(e) = host.convert_to_group(&record.node_name) {
                log::warn!("{}", e);
                self.report.warnings.push(e.to_string());
            }
        }
    }
}

fn assign_fixed(record: &mut ResourceRecord, section: &ResourceSection, honor_skips: bool) {
    record.categories.clear();
    if !section.enabled || record.is_missing() {
        return;
    }
    if honor_skips
        && ((section.skip_disabled && record.flags.disabled)
            || (section.skip_disconnected && record.flags.disconnected))
    {
        return;
    }
    if let Some(category) = record.kind.fixed_category() {
        record.categories.push(category.to_string());
    }
}

/// A record can go through the bulk copier when it is a sequence whose
/// frames share one directory.
fn can_bulk_copy(record: &ResourceRecord) -> bool {
    if !record.is_sequence() || VIEW_PLACEHOLDERS.iter().any(|p| record.resolved.path.contains(*p)) {
        return false;
    }
    let Some(first) = record.first_file() else {
        return false;
    };
    let dir: &str = parent_dir(first);
    record.files.iter().all(|f| parent_dir(&f.path) == dir)
}

fn copy_sequence(
    copier: &dyn Copier,
    record: &ResourceRecord,
    target: &TargetSet,
) -> (Option<CopiedSet>, Vec<CopyIssue>) {
    let pairs: Vec<(String, String)> = record
        .files
        .iter()
        .zip(&target.copy)
        .map(|(file, destination)| (file.path.clone(), destination.clone()))
        .collect();
    let source_dir: &str = record.first_file().map(parent_dir).unwrap_or_default();
    let pattern: String = match &record.resolved.frame {
        Some(frame) => frame.glob(),
        None => file_name(&record.resolved.path).to_string(),
    };

    let sequence: SequenceCopy<'_> = SequenceCopy {
        source_dir,
        destination_dir: &target.template,
        pattern: &pattern,
        files: &pairs,
    };
    match copier.copy_sequence(&sequence) {
        Ok(bytes) => (
            Some(CopiedSet {
                record: record.id,
                node_name: record.node_name.clone(),
                category: target.category.clone(),
                destination: target.template.clone(),
                file_count: pairs.len(),
                bytes,
                bulk: true,
            }),
            Vec::new(),
        ),
        Err(e) => (
            None,
            vec![CopyIssue::from_error(
                record.id,
                format!("{}/{}", source_dir, pattern),
                &target.template,
                &e,
            )],
        ),
    }
}

fn copy_files(
    copier: &dyn Copier,
    record: &ResourceRecord,
    target: &TargetSet,
) -> (Option<CopiedSet>, Vec<CopyIssue>) {
    let mut issues: Vec<CopyIssue> = Vec::new();
    let mut files: usize = 0;
    let mut bytes: u64 = 0;
    for (file, destination) in record.files.iter().zip(&target.copy) {
        match copier.copy_file(&file.path, destination) {
            Ok(copied) => {
                files += 1;
                bytes += copied;
            }
            Err(e) => issues.push(CopyIssue::from_error(record.id, &file.path, destination, &e)),
        }
    }
    let copied: Option<CopiedSet> = (files > 0).then(|| CopiedSet {
        record: record.id,
        node_name: record.node_name.clone(),
        category: target.category.clone(),
        destination: target.template.clone(),
        file_count: files,
        bytes,
        bulk: false,
    });
    (copied, issues)
}

/// File name without its last extension.
fn file_stem(path: &str) -> &str {
    let name: &str = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostNode, MemoryHost};
    use crate::settings::JobSettings;
    use rusty_pack_common::to_posix_path;
    use tempfile::TempDir;

    fn settings(out: &str) -> PackSettings {
        let mut settings: PackSettings = PackSettings::default();
        settings.job = JobSettings {
            job_name_default: "Pack_v001".to_string(),
            job_name_check: String::new(),
            job_root: out.to_string(),
        };
        settings
    }

    fn run(out: &str) -> PackRun {
        PackRun::new(settings(out), Anatomy::new().with_token("folder[name]", "sh010")).unwrap()
    }

    #[test]
    fn test_steps_must_run_in_order() {
        let mut run: PackRun = run("/out");

        match run.classify() {
            Err(PackError::InvalidPhase {
                operation,
                current,
                expected,
            }) => {
                assert_eq!(operation, "classify");
                assert_eq!(current, Phase::Ready);
                assert_eq!(expected, Phase::Scanned);
            }
            other => panic!("expected InvalidPhase, got {:?}", other.err()),
        }

        run.scan(&MemoryHost::new()).unwrap();
        assert!(matches!(run.scan(&MemoryHost::new()), Err(PackError::InvalidPhase { .. })));
        assert!(matches!(run.template(), Err(PackError::InvalidPhase { .. })));
        assert_eq!(run.phase(), Phase::Scanned);
    }

    #[test]
    fn test_script_name_token_from_project_path() {
        let mut run: PackRun = run("/out");
        let host: MemoryHost = MemoryHost::new().with_project_path("/shows/sh010/comp_v003.nk");

        run.scan(&host).unwrap();

        assert_eq!(run.anatomy().get(SCRIPT_NAME_TOKEN), Some("comp_v003"));
        assert_eq!(run.anatomy().get("job[name]"), Some("Pack_v001"));
    }

    #[test]
    fn test_job_name_warning_is_reported() {
        let mut settings: PackSettings = settings("/out");
        settings.job.job_name_check = r"Delivery_\d+".to_string();

        let run: PackRun = PackRun::new(settings, Anatomy::new()).unwrap();

        assert_eq!(run.report().warnings.len(), 1);
    }

    #[test]
    fn test_script_outputs() {
        let job: JobPlan = JobPlan::resolve(
            &JobSettings {
                job_name_default: "Pack".to_string(),
                job_name_check: String::new(),
                job_root: "/out".to_string(),
            },
            &Anatomy::new(),
        )
        .unwrap();
        let mut anatomy: Anatomy = Anatomy::new().with_token(SCRIPT_NAME_TOKEN, "comp");
        job.apply(&mut anatomy);

        let source = ScriptOutputSettings {
            copy: true,
            path: "{job[root]}/{job[name]}/{script_name}_source.nk".to_string(),
            ..ScriptOutputSettings::default()
        };
        let package = ScriptOutputSettings::default();
        let target = ScriptOutputSettings {
            copy: true,
            path: "{job[name]}/nuke/{script_name}.nk".to_string(),
            path_relink: "/vendor/sh010/nuke/{script_name}.nk".to_string(),
            relative: true,
        };

        let outputs: Vec<ScriptOutput> =
            ScriptOutput::from_settings(&source, &package, &target, &anatomy, &job);

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].kind, ScriptKind::Source);
        assert_eq!(outputs[0].save_path, "/out/Pack/comp_source.nk");
        assert_eq!(outputs[0].destination, ScriptDestination::Original);
        assert_eq!(outputs[1].save_path, "/out/Pack/nuke/comp.nk");
        assert_eq!(outputs[1].link_root, "/vendor/sh010/nuke");
        assert!(outputs[1].relative);
    }

    #[test]
    fn test_link_values() {
        let output: ScriptOutput = ScriptOutput {
            kind: ScriptKind::Target,
            save_path: "/out/Pack/nuke/comp.nk".to_string(),
            link_root: "/vendor/sh010/nuke".to_string(),
            destination: ScriptDestination::Relink,
            relative: true,
        };

        assert_eq!(
            output.link_value("/vendor/sh010/nuke/plates/p.%04d.exr", "[value root.name]"),
            "plates/p.%04d.exr"
        );
        assert_eq!(
            output.link_value("/vendor/sh010/plates/p.%04d.exr", "[value root.name]"),
            "[file dirname [file dirname [value root.name]]]/plates/p.%04d.exr"
        );

        let absolute: ScriptOutput = ScriptOutput {
            relative: false,
            ..output
        };
        assert_eq!(
            absolute.link_value("/vendor/sh010/plates/p.exr", "[value root.name]"),
            "/vendor/sh010/plates/p.exr"
        );
    }

    #[test]
    fn test_fixed_categories_respect_sections() {
        let dir: TempDir = TempDir::new().unwrap();
        let root: String = to_posix_path(dir.path());
        let font: String = format!("{}/Title.ttf", root);
        std::fs::write(&font, b"font").unwrap();

        let host: MemoryHost = MemoryHost::new()
            .with_node(
                HostNode::new("Text1", "Text2")
                    .with_file("font", &font)
                    .with_output("Merge1"),
            )
            .with_node(HostNode::new("Text2", "Text2").with_file("font", &font));

        let mut run: PackRun = run(&root);
        run.scan(&host).unwrap();
        run.classify().unwrap();

        assert_eq!(run.records()[0].categories, vec!["fonts"]);
        assert!(run.records()[1].categories.is_empty());
    }

    #[test]
    fn test_cancel_between_records() {
        let dir: TempDir = TempDir::new().unwrap();
        let root: String = to_posix_path(dir.path());
        let mut host: MemoryHost = MemoryHost::new();
        for (i, name) in ["a.exr", "b.exr", "c.exr"].iter().enumerate() {
            let path: String = format!("{}/src/{}", root, name);
            std::fs::create_dir_all(format!("{}/src", root)).unwrap();
            std::fs::write(&path, name.as_bytes()).unwrap();
            host = host.with_node(
                HostNode::new(format!("Read{}", i), "Read")
                    .with_file("file", &path)
                    .with_output("Merge1"),
            );
        }

        let mut run: PackRun = run(&format!("{}/out", root));
        run.scan(&host).unwrap();
        run.classify().unwrap();
        run.deduplicate().unwrap();
        run.template().unwrap();
        run.write_report(&format!("{}/report.json", root)).unwrap();

        let stop_after_first = |p: &PackProgress| p.records_done < 1;
        let result = run.copy(&FsCopier, Some(&stop_after_first));

        assert!(matches!(
            result,
            Err(PackError::Cancelled {
                completed: 1,
                total: 3
            })
        ));
        assert_eq!(run.report().copied.len(), 1);
    }

    #[test]
    fn test_timestamp_fixed_for_the_run() {
        let dir: TempDir = TempDir::new().unwrap();
        let root: String = to_posix_path(dir.path());
        let plate: String = format!("{}/src/bg.exr", root);
        std::fs::create_dir_all(format!("{}/src", root)).unwrap();
        std::fs::write(&plate, b"bg").unwrap();
        let mut host: MemoryHost = MemoryHost::new().with_node(
            HostNode::new("Read1", "Read")
                .with_file("file", &plate)
                .with_output("Merge1"),
        );

        let mut run: PackRun = run(&format!("{}/out", root));
        let timestamp: String = run.anatomy().get(TIMESTAMP_TOKEN).unwrap().to_string();
        let before: String = format!("{}/before.json", root);
        let after: String = format!("{}/after.json", root);

        run.scan(&host).unwrap();
        run.classify().unwrap();
        run.deduplicate().unwrap();
        run.template().unwrap();
        run.write_report(&before).unwrap();
        run.copy(&FsCopier, None).unwrap();
        run.relink(&mut host).unwrap();
        run.finish(&after).unwrap();

        for path in [&before, &after] {
            let written: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(written["rows"][0]["timestamp"], timestamp.as_str());
        }

        let given: PackRun = PackRun::new(
            settings("/out"),
            Anatomy::new().with_token(TIMESTAMP_TOKEN, "2024-05-30T10:23:06Z"),
        )
        .unwrap();
        assert_eq!(given.anatomy().get(TIMESTAMP_TOKEN), Some("2024-05-30T10:23:06Z"));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("/a/comp_v003.nk"), "comp_v003");
        assert_eq!(file_stem("/a/.hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
    }
}
