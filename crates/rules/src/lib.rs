//! Category rules and resource classification for rusty-pack.
//!
//! A category bundles destination templates, node state switches and a list
//! of filters. Resources are matched against every category in configuration
//! order and may land in several categories at once.
//!
//! # Filter Sources
//!
//! - `File Name` - regex against the first concrete file's name
//! - `File Path` (alias `Full Path`) - regex against its full path
//! - `Node Class` - membership in a whitespace separated class list

mod classify;
mod error;
mod types;

pub use classify::{CategoryOutcome, Classification, Classifier, ClassifySubject, SkipReason};
pub use error::RuleError;
pub use types::{
    default_category, Category, CategoryConfig, CategoryPaths, CategoryRules, CombineMode, Filter,
    FilterOptions, FilterSource,
};
