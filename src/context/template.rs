//! Path template rendering
//!
//! Endpoint paths name context keys in braces: `/blocks/{page_id}/children`.

use super::types::Context;
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Regex for matching path variables: {variable}
static PATH_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Substitute context values into a path template
///
/// Every referenced key must be present; the error names all missing ones.
pub fn render_path(template: &str, context: &Context) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = PATH_VAR_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let name = &cap[1];
        match context.get(name) {
            Some(value) => value.to_string(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a path contains variables
pub fn has_variables(template: &str) -> bool {
    PATH_VAR_REGEX.is_match(template)
}

/// Extract all variable names from a path template
pub fn path_variables(template: &str) -> Vec<String> {
    PATH_VAR_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}
