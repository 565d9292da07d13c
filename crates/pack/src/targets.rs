//! Destination templating for copy and relink.

use rusty_pack_common::{file_name, join_posix, join_template, parent_dir, relative_path, TokenMap};
use rusty_pack_rules::{Category, CategoryPaths};

use crate::anatomy::{Anatomy, JobPlan};
use crate::record::{ResourceKind, ResourceRecord, TargetSet};
use crate::settings::PackSettings;

/// Which side of a delivery a link points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    /// The package as copied at the source place.
    Copy,
    /// The package as delivered at the target place.
    Relink,
}

/// Everything needed to expand destination templates.
pub struct TargetPlanner<'a> {
    anatomy: &'a Anatomy,
    job: &'a JobPlan,
    settings: &'a PackSettings,
    categories: Vec<Category>,
}

impl<'a> TargetPlanner<'a> {
    /// Create a planner.
    ///
    /// # Arguments
    /// * `anatomy` - Anatomy with the job tokens applied
    /// * `job` - Job plan; relative copy destinations are placed under its root
    /// * `settings` - Pack settings holding the category and section templates
    pub fn new(anatomy: &'a Anatomy, job: &'a JobPlan, settings: &'a PackSettings) -> Self {
        Self {
            anatomy,
            job,
            settings,
            categories: settings.categories.effective(),
        }
    }

    fn paths_for(&self, kind: ResourceKind, category: &str) -> Option<&CategoryPaths> {
        match kind {
            ResourceKind::Media => self
                .categories
                .iter()
                .find(|c| c.name == category)
                .map(|c| &c.paths),
            ResourceKind::Font => Some(&self.settings.fonts.paths),
            ResourceKind::ReusableNode => Some(&self.settings.gizmos.paths),
            ResourceKind::ColorConfig => Some(&self.settings.ocio.paths),
        }
    }

    /// Token context of a record, without the `category` token.
    fn record_tokens(&self, record: &ResourceRecord) -> TokenMap {
        let mut tokens: TokenMap = self.anatomy.tokens().clone();
        tokens.extend(record.tokens.iter().map(|(k, v)| (k.clone(), v.clone())));
        tokens.insert("node[name]".to_string(), record.node_name.clone());
        tokens.insert("node[class]".to_string(), record.node_class.clone());
        tokens.insert("basename".to_string(), record.display_name().to_string());
        if let Some(font) = &record.font {
            tokens.insert("font".to_string(), font.family.clone());
        }
        tokens
    }

    /// File names below the target directory, one per concrete file.
    ///
    /// Color configurations keep their structure below the configuration
    /// directory.
    fn target_names(&self, record: &ResourceRecord) -> Vec<String> {
        match (record.kind, record.resolved.files.first()) {
            (ResourceKind::ColorConfig, Some(config)) => {
                let config_dir: &str = parent_dir(config);
                record
                    .files
                    .iter()
                    .map(|f| relative_path(&f.path, config_dir).path)
                    .collect()
            }
            _ => record
                .files
                .iter()
                .map(|f| file_name(&f.path).to_string())
                .collect(),
        }
    }

    /// Expand the targets of one record for each of its categories.
    ///
    /// Duplicates, missing and uncategorized records get no targets.
    pub fn plan(&self, record: &mut ResourceRecord) {
        record.targets.clear();
        if record.is_duplicate() || record.is_missing() || !record.is_categorized() {
            return;
        }

        let mut tokens: TokenMap = self.record_tokens(record);
        let names: Vec<String> = self.target_names(record);

        for category in record.categories.clone() {
            let Some(paths) = self.paths_for(record.kind, &category) else {
                log::warn!("{}: unknown category '{}'", record.node_name, category);
                continue;
            };
            tokens.insert("category".to_string(), category.clone());

            let template: String =
                self.job
                    .place(&join_template(&paths.root_template, &paths.top_folder, &tokens));
            let template_relink: String = join_template(
                &paths.root_template_relink,
                &paths.top_folder_relink,
                &tokens,
            );
            let copy: Vec<String> = names
                .iter()
                .map(|n| join_posix(&[template.as_str(), n.as_str()]))
                .collect();
            let relink: Vec<String> = names
                .iter()
                .map(|n| join_posix(&[template_relink.as_str(), n.as_str()]))
                .collect();

            log::debug!("{} -> {} ({})", record.node_name, template, category);
            record.targets.push(TargetSet {
                category,
                template,
                template_relink,
                copy,
                relink,
            });
        }
    }

    /// Expand targets for every record.
    ///
    /// # Returns
    /// Number of records with at least one target.
    pub fn plan_all(&self, records: &mut [ResourceRecord]) -> usize {
        records
            .iter_mut()
            .map(|record| {
                self.plan(record);
                usize::from(!record.targets.is_empty())
            })
            .sum()
    }
}

/// Absolute path a record links to on the given side of the delivery.
///
/// Links use the record's first target. Sequences link to the directory plus
/// the printf playback pattern; color configurations to the configuration
/// file itself.
///
/// # Returns
/// `None` when the record has no target.
pub fn link_path(record: &ResourceRecord, side: LinkSide) -> Option<String> {
    let target: &TargetSet = record.primary_target()?;
    let dir: &str = match side {
        LinkSide::Copy => &target.template,
        LinkSide::Relink => &target.template_relink,
    };
    let name: String = match record.kind {
        ResourceKind::Media => record.resolved.playback_name(),
        ResourceKind::ColorConfig => match record.resolved.files.first() {
            Some(config) => file_name(config).to_string(),
            None => record.display_name().to_string(),
        },
        ResourceKind::Font | ResourceKind::ReusableNode => {
            file_name(record.first_file()?).to_string()
        }
    };
    Some(join_posix(&[dir, name.as_str()]))
}
