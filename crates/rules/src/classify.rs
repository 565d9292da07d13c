//! Resource classification against category rules.

use regex::Regex;
use rusty_pack_common::{file_name, TokenMap};

use crate::error::RuleError;
use crate::types::{Category, CategoryRules, CombineMode, Filter, FilterSource};

/// What the classifier sees of a resource.
#[derive(Debug, Clone, Copy)]
pub struct ClassifySubject<'a> {
    pub node_name: &'a str,
    pub node_class: &'a str,
    /// Full path of the first concrete file, `None` when the resource is missing.
    pub first_file: Option<&'a str>,
    pub disabled: bool,
    pub disconnected: bool,
}

/// Why a category rejected a resource before its filters ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Disconnected,
    NoFiles,
}

/// Outcome of evaluating one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// Filters matched; carries the tokens they contributed.
    Matched(TokenMap),
    Skipped(SkipReason),
    NotMatched,
}

/// Categories assigned to a resource and the tokens collected on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Matched category names in rule order.
    pub categories: Vec<String>,
    pub tokens: TokenMap,
}

impl Classification {
    /// Whether no category was assigned.
    pub fn is_uncategorized(&self) -> bool {
        self.categories.is_empty()
    }
}

struct CompiledFilter {
    filter: Filter,
    /// `None` when the pattern failed to compile; such a filter never matches.
    regex: Option<Regex>,
    classes: Vec<String>,
}

/// Result of a single filter: whether it matched and the captured value.
struct FilterHit {
    matched: bool,
    token: Option<String>,
}

impl CompiledFilter {
    fn compile(category: &str, filter: &Filter) -> (Self, Option<RuleError>) {
        let mut error: Option<RuleError> = None;
        let (regex, classes): (Option<Regex>, Vec<String>) = match filter.source {
            FilterSource::NodeClass => (
                None,
                filter
                    .search
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            ),
            FilterSource::FileName | FilterSource::FilePath => match Regex::new(&filter.search) {
                Ok(regex) => (Some(regex), Vec::new()),
                Err(e) => {
                    error = Some(RuleError::InvalidRegex {
                        category: category.to_string(),
                        pattern: filter.search.clone(),
                        reason: e.to_string(),
                    });
                    (None, Vec::new())
                }
            },
        };
        let compiled = Self {
            filter: filter.clone(),
            regex,
            classes,
        };
        (compiled, error)
    }

    fn evaluate(&self, full_path: &str, node_class: &str) -> FilterHit {
        match self.filter.source {
            FilterSource::NodeClass => self.evaluate_class(node_class),
            FilterSource::FileName => self.evaluate_regex(file_name(full_path)),
            FilterSource::FilePath => self.evaluate_regex(full_path),
        }
    }

    fn evaluate_class(&self, node_class: &str) -> FilterHit {
        let listed: bool = self.classes.iter().any(|c| c == node_class);
        let matched: bool = listed != self.filter.invert;
        FilterHit {
            matched,
            token: matched.then(|| node_class.to_string()),
        }
    }

    fn evaluate_regex(&self, source: &str) -> FilterHit {
        let Some(regex) = &self.regex else {
            return FilterHit {
                matched: false,
                token: None,
            };
        };

        let captured: Option<String> = regex.captures(source).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
        });
        let hit: bool = match &captured {
            Some(value) => self.filter.check.is_empty() || self.filter.check.contains(value),
            None => false,
        };
        let matched: bool = hit != self.filter.invert;
        FilterHit {
            matched,
            token: if matched { captured } else { None },
        }
    }
}

struct CompiledCategory {
    category: Category,
    filters: Vec<CompiledFilter>,
}

/// Assigns categories and tokens to resources.
///
/// Regexes are compiled once when the classifier is built. A pattern that
/// fails to compile is logged and recorded in [`Classifier::compile_errors`];
/// its filter never matches.
pub struct Classifier {
    categories: Vec<CompiledCategory>,
    compile_errors: Vec<RuleError>,
}

impl Classifier {
    /// Build a classifier for the given categories, evaluated in order.
    pub fn new(categories: Vec<Category>) -> Self {
        let mut compile_errors: Vec<RuleError> = Vec::new();
        let categories: Vec<CompiledCategory> = categories
            .into_iter()
            .map(|category| {
                let filters: Vec<CompiledFilter> = category
                    .filters
                    .iter()
                    .map(|filter| {
                        let (compiled, error) = CompiledFilter::compile(&category.name, filter);
                        if let Some(error) = error {
                            log::warn!("{}", error);
                            compile_errors.push(error);
                        }
                        compiled
                    })
                    .collect();
                CompiledCategory { category, filters }
            })
            .collect();
        Self {
            categories,
            compile_errors,
        }
    }

    /// Build a classifier from configured rules, using the default category
    /// when none are configured.
    pub fn from_rules(rules: &CategoryRules) -> Self {
        Self::new(rules.effective())
    }

    /// Patterns that failed to compile.
    pub fn compile_errors(&self) -> &[RuleError] {
        &self.compile_errors
    }

    /// The categories in evaluation order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().map(|c| &c.category)
    }

    /// Classify a resource against every category.
    ///
    /// # Returns
    /// Matched category names in rule order, and the union of their tokens
    /// (a later category overwrites an earlier one's token of the same name).
    pub fn classify(&self, subject: &ClassifySubject<'_>) -> Classification {
        let mut classification: Classification = Classification::default();
        for compiled in &self.categories {
            match evaluate_category(compiled, subject) {
                CategoryOutcome::Matched(tokens) => {
                    classification
                        .categories
                        .push(compiled.category.name.clone());
                    classification.tokens.extend(tokens);
                }
                CategoryOutcome::Skipped(reason) => {
                    log::debug!(
                        "{} skipped for category '{}': {:?}",
                        subject.node_name,
                        compiled.category.name,
                        reason
                    );
                }
                CategoryOutcome::NotMatched => {}
            }
        }
        classification
    }

    /// Evaluate a single named category.
    ///
    /// # Returns
    /// `None` if no category has that name.
    pub fn evaluate(&self, name: &str, subject: &ClassifySubject<'_>) -> Option<CategoryOutcome> {
        self.categories
            .iter()
            .find(|c| c.category.name == name)
            .map(|c| evaluate_category(c, subject))
    }
}

fn evaluate_category(compiled: &CompiledCategory, subject: &ClassifySubject<'_>) -> CategoryOutcome {
    let options = &compiled.category.options;
    if options.skip_disconnected && subject.disconnected {
        return CategoryOutcome::Skipped(SkipReason::Disconnected);
    }
    if options.skip_disabled && subject.disabled {
        return CategoryOutcome::Skipped(SkipReason::Disabled);
    }
    let Some(full_path) = subject.first_file else {
        return CategoryOutcome::Skipped(SkipReason::NoFiles);
    };

    let mut matches: usize = 0;
    let mut tokens: TokenMap = TokenMap::new();
    for filter in &compiled.filters {
        let hit: FilterHit = filter.evaluate(full_path, subject.node_class);
        if hit.matched {
            matches += 1;
            if let Some(token) = hit.token {
                tokens.insert(filter.filter.token_name.clone(), token);
            }
        }
    }

    let accepted: bool = match options.combine_filters {
        CombineMode::And => matches == compiled.filters.len(),
        CombineMode::Or => matches > 0,
    };
    if accepted {
        CategoryOutcome::Matched(tokens)
    } else {
        CategoryOutcome::NotMatched
    }
}
