//! Inline directives scanned anywhere in a task body.
//!
//! Unlike the line grammar, a reference here is only the raw text; resolving
//! it against the batch is the builder's job.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DepgraphError;

const REFERENCE: &str = r"([a-z0-9:/_.-]+issues/[0-9]+|[a-z0-9:/_.-]+#[0-9]+|[a-z0-9/_-]*#[0-9]+)";

static CHILDREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(requires|require|blocked by|block by|depends on|depend on|parent of) {}",
        REFERENCE
    ))
    .expect("Invalid regex pattern")
});

static PARENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(blocks|block|addresses|address|part of|child of|fixes|fix) {}",
        REFERENCE
    ))
    .expect("Invalid regex pattern")
});

static DUPLICATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(duplicate of|duplicates|duplicate|dup of|dup) {}",
        REFERENCE
    ))
    .expect("Invalid regex pattern")
});

static WEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdepviz\.(?:base_weight|weight)[:= ]+([^\s,;]+)").expect("Invalid regex pattern")
});

static HIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdepviz\.hide\b").expect("Invalid regex pattern"));

/// `depviz.hide` anywhere in the body.
pub fn is_hidden(body: &str) -> bool {
    HIDE.is_match(body)
}

/// First `duplicate of <ref>` reference, if any.
pub fn duplicate_of(body: &str) -> Option<&str> {
    DUPLICATE
        .captures(body)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

/// Value of the first `depviz.weight` / `depviz.base_weight` directive.
pub fn weight(body: &str) -> Option<Result<u32, DepgraphError>> {
    let captures = WEIGHT.captures(body)?;
    let raw = captures[1].trim_end_matches('.');
    Some(raw.parse::<u32>().map_err(|_| DepgraphError::InvalidDirectiveValue {
        directive: "depviz.weight".to_string(),
        value: raw.to_string(),
    }))
}

/// References this task declares as its children (`blocked by #3`, `depends on #4`).
pub fn children(body: &str) -> Vec<&str> {
    references(&CHILDREN, body)
}

/// References this task declares as its parents (`blocks #3`, `part of #4`).
pub fn parents(body: &str) -> Vec<&str> {
    references(&PARENTS, body)
}

fn references<'a>(pattern: &Regex, body: &'a str) -> Vec<&'a str> {
    pattern
        .captures_iter(body)
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str())
        .collect()
}
