//! Relationship grammar.
//!
//! Two rule sets with different callers:
//! - the standalone-line grammar here (`Depends on: #42` alone on a line),
//!   used to fill a task's typed edge lists;
//! - the inline directives in [`directives`] (`blocked by #3` anywhere in the
//!   body), used by the graph builder for parent/child/duplicate edges.

pub mod directives;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::{decode, Entity};
use crate::error::DepgraphError;

/// Kind of dependency a directive line declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    Blocks,
    DependsOn,
    Fixes,
    Closes,
    Addresses,
    RelatedWith,
    PartOf,
    ParentOf,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 8] = [
        RelationshipKind::Blocks,
        RelationshipKind::DependsOn,
        RelationshipKind::Fixes,
        RelationshipKind::Closes,
        RelationshipKind::Addresses,
        RelationshipKind::RelatedWith,
        RelationshipKind::PartOf,
        RelationshipKind::ParentOf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Blocks => "blocks",
            RelationshipKind::DependsOn => "depends-on",
            RelationshipKind::Fixes => "fixes",
            RelationshipKind::Closes => "closes",
            RelationshipKind::Addresses => "addresses",
            RelationshipKind::RelatedWith => "related-with",
            RelationshipKind::PartOf => "part-of",
            RelationshipKind::ParentOf => "parent-of",
        }
    }

    /// Verb synonyms, longest first.
    fn verbs(&self) -> &'static str {
        match self {
            RelationshipKind::Blocks => "blocks|block",
            RelationshipKind::DependsOn => "depends on|depend on|depends|depend",
            RelationshipKind::Fixes => "fixes|fix",
            RelationshipKind::Closes => "closes|close",
            RelationshipKind::Addresses => "addresses|address",
            RelationshipKind::RelatedWith => "related with|related",
            RelationshipKind::PartOf => "part of|part",
            RelationshipKind::ParentOf => "parent of|parent",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed edge from the scanned task to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target: Entity,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.target)
    }
}

static LINE_PATTERNS: Lazy<Vec<(RelationshipKind, Regex)>> = Lazy::new(|| {
    RelationshipKind::ALL
        .iter()
        .map(|kind| {
            let pattern = format!(
                r"(?im)^[ \t]*({})(?:[ \t]*[:=][ \t]*|[ \t]+)(\S+?)[.,]?[ \t\r]*$",
                kind.verbs()
            );
            (*kind, Regex::new(&pattern).expect("Invalid regex pattern"))
        })
        .collect()
});

/// Scan `body` for standalone directive lines and resolve each reference
/// relative to `context`. Unresolvable references come back as errors.
pub fn parse_relationships(context: &Entity, body: &str) -> (Vec<Relationship>, Vec<DepgraphError>) {
    scan(body, |reference| decode(reference, Some(context)))
}

/// Same as [`parse_relationships`] with no context: references must be absolute
/// or GitHub shorthand.
pub fn parse_body(body: &str) -> (Vec<Relationship>, Vec<DepgraphError>) {
    scan(body, |reference| decode(reference, None))
}

fn scan<F>(body: &str, resolve: F) -> (Vec<Relationship>, Vec<DepgraphError>)
where
    F: Fn(&str) -> crate::Result<Entity>,
{
    let mut relationships = Vec::new();
    let mut errors = Vec::new();

    for (kind, pattern) in LINE_PATTERNS.iter() {
        for captures in pattern.captures_iter(body) {
            let reference = &captures[2];
            match resolve(reference) {
                Ok(target) => relationships.push(Relationship { kind: *kind, target }),
                Err(e) => {
                    log::debug!("Unresolved {} reference {:?}: {}", kind, reference, e);
                    errors.push(DepgraphError::UnresolvedReference {
                        relation: kind.to_string(),
                        target: reference.to_string(),
                    });
                }
            }
        }
    }

    relationships.sort_by_cached_key(|r| (r.kind.as_str(), r.target.canonical_string()));
    relationships.dedup();
    (relationships, errors)
}
