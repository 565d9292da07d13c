//! Path template expansion.
//!
//! Templates contain `{token}` or `{token[subkey]}` placeholders, optionally
//! followed by a numeric format spec such as `{version:03d}`. Tokens are looked
//! up in a flat map, so `{folder[name]}` reads the key `folder[name]`.
//!
//! A placeholder whose token is missing is left in the output verbatim.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::path_utils::{join_posix, to_posix_str};

/// Flat token name -> value mapping used for template expansion.
pub type TokenMap = HashMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\[[A-Za-z0-9_]+\])?)(?::([^{}]*))?\}")
            .expect("placeholder pattern is valid")
    })
}

/// Expand a template against a token map.
///
/// # Arguments
/// * `template` - Template string with `{token}` placeholders
/// * `tokens` - Flat token map
///
/// # Returns
/// The expanded string with all backslashes normalized to forward slashes.
///
/// # Example
/// ```
/// use rusty_pack_common::{expand_template, TokenMap};
///
/// let mut tokens = TokenMap::new();
/// tokens.insert("folder[name]".into(), "sh010".into());
/// assert_eq!(expand_template("{job}/{folder[name]}", &tokens), "{job}/sh010");
/// ```
pub fn expand_template(template: &str, tokens: &TokenMap) -> String {
    let expanded = placeholder_regex().replace_all(template, |caps: &Captures| {
        let key: &str = &caps[1];
        match tokens.get(key) {
            Some(value) => apply_format_spec(value, caps.get(2).map(|m| m.as_str())),
            None => caps[0].to_string(),
        }
    });
    to_posix_str(&expanded)
}

/// Apply a format spec to a token value.
///
/// Only zero-padded integer specs (`03d`, `4d`, `d`) are interpreted; any
/// other spec, or a non-numeric value, inserts the value unchanged.
fn apply_format_spec(value: &str, spec: Option<&str>) -> String {
    let Some(spec) = spec.filter(|s| !s.is_empty()) else {
        return value.to_string();
    };
    let Some(width) = spec.strip_suffix('d') else {
        return value.to_string();
    };
    let Ok(number) = value.trim().parse::<i64>() else {
        return value.to_string();
    };
    let zero_pad: bool = width.starts_with('0');
    let width: usize = width.trim_start_matches('0').parse().unwrap_or(0);
    if zero_pad {
        format!("{:0width$}", number, width = width)
    } else {
        format!("{:width$}", number, width = width)
    }
}

/// Expand a root template and an optional top-folder template and join them.
///
/// # Arguments
/// * `root` - Root template
/// * `top_folder` - Top folder template (may be empty)
/// * `tokens` - Flat token map
pub fn join_template(root: &str, top_folder: &str, tokens: &TokenMap) -> String {
    let root: String = expand_template(root, tokens);
    let top: String = expand_template(top_folder, tokens);
    join_posix(&[root, top])
}
