//! Dependency graph: raw fetcher records, graph nodes, builder and filters.
//!
//! Fetchers hand over a [`Batch`] of raw records keyed by string ids. The
//! [`builder`] turns a batch into a [`Graph`] of tasks, owners and topics with
//! canonical ids and derived flags; [`filter`] selects the visible part of it.

pub mod builder;
pub mod filter;

pub use builder::{build, build_with, GraphConfig};
pub use filter::{generate_combinations_with_repetition, load, load_owners, load_topics, Filters};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{decode, Entity, Kind};
use crate::error::{DepgraphError, Result};
use crate::grammar::{parse_relationships, RelationshipKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Issue,
    MergeRequest,
    Milestone,
    Card,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Issue => "issue",
            TaskKind::MergeRequest => "merge_request",
            TaskKind::Milestone => "milestone",
            TaskKind::Card => "card",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Open,
    Closed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Open => "open",
            TaskState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
    Repo,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::User => "user",
            OwnerKind::Organization => "organization",
            OwnerKind::Repo => "repo",
        }
    }
}

/// An issue, pull request, milestone or card as a fetcher saw it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Label ids or bare label names of the record's repo.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOwner {
    pub id: String,
    #[serde(default)]
    pub kind: OwnerKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTopic {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Everything one fetch produced. Batches for independent targets are disjoint
/// and are simply concatenated before building.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub owners: Vec<RawOwner>,
    #[serde(default)]
    pub topics: Vec<RawTopic>,
}

impl Batch {
    pub fn merge<I: IntoIterator<Item = Batch>>(batches: I) -> Batch {
        let mut merged = Batch::default();
        for batch in batches {
            merged.extend(batch);
        }
        merged
    }

    pub fn extend(&mut self, other: Batch) {
        self.records.extend(other.records);
        self.owners.extend(other.owners);
        self.topics.extend(other.topics);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.owners.is_empty() && self.topics.is_empty()
    }

    /// Raw form of an already built graph, so that it can be rebuilt together
    /// with newer records.
    pub fn from_graph(graph: &Graph) -> Batch {
        Batch {
            records: graph.tasks.iter().map(Task::to_record).collect(),
            owners: graph.owners.iter().map(Owner::to_raw).collect(),
            topics: graph.topics.iter().map(Topic::to_raw).collect(),
        }
    }
}

/// Graph node for an issue, merge request, milestone or card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Entity,
    pub local_id: String,
    pub kind: TaskKind,
    pub title: String,
    pub body: String,
    pub state: TaskState,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub is_blocking: Vec<Entity>,
    pub is_depending_on: Vec<Entity>,
    pub is_related_with: Vec<Entity>,
    pub is_part_of: Vec<Entity>,
    pub has_part: Vec<Entity>,
    pub has_owner: Option<Entity>,
    pub has_author: Option<Entity>,
    pub has_milestone: Option<Entity>,
    pub has_label: Vec<Entity>,
    pub has_assignee: Vec<Entity>,

    pub errors: Vec<String>,
    pub parents: Vec<Entity>,
    pub children: Vec<Entity>,
    pub duplicates: Vec<Entity>,
    pub weight: u32,
    pub is_hidden: bool,
    pub is_epic: bool,
    pub has_epic: bool,
    pub is_orphan: bool,
}

impl Task {
    /// Structural conversion of a fetcher record. Fails only when the record's
    /// own id cannot be decoded; unreadable metadata references are dropped.
    pub fn from_record(record: &RawRecord) -> Result<Task> {
        if record.id.trim().is_empty() {
            return Err(DepgraphError::InvalidRecord("record without id".to_string()));
        }
        let id = decode(&record.id, None)
            .map_err(|e| DepgraphError::InvalidRecord(format!("{:?}: {}", record.id, e)))?;

        let has_owner = optional_reference(&id, record.owner.as_deref(), "owner")
            .or_else(|| id.repo_entity());
        let has_author = optional_reference(&id, record.author.as_deref(), "author");
        let has_milestone = optional_reference(&id, record.milestone.as_deref(), "milestone");
        let mut has_label: Vec<Entity> = record
            .labels
            .iter()
            .filter_map(|label| resolve_label(&id, label))
            .collect();
        has_label.sort();
        has_label.dedup();
        let mut has_assignee: Vec<Entity> = record
            .assignees
            .iter()
            .filter_map(|assignee| optional_reference(&id, Some(assignee), "assignee"))
            .collect();
        has_assignee.sort();
        has_assignee.dedup();

        Ok(Task {
            local_id: id.local_id(),
            id,
            kind: record.kind,
            title: record.title.clone(),
            body: record.body.clone(),
            state: record.state,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_blocking: Vec::new(),
            is_depending_on: Vec::new(),
            is_related_with: Vec::new(),
            is_part_of: Vec::new(),
            has_part: Vec::new(),
            has_owner,
            has_author,
            has_milestone,
            has_label,
            has_assignee,
            errors: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            duplicates: Vec::new(),
            weight: 0,
            is_hidden: false,
            is_epic: false,
            has_epic: false,
            is_orphan: true,
        })
    }

    /// Inverse of [`Task::from_record`] for the fetched fields.
    pub fn to_record(&self) -> RawRecord {
        RawRecord {
            id: self.id.portable_string(),
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            state: self.state,
            created_at: self.created_at,
            updated_at: self.updated_at,
            labels: self.has_label.iter().map(Entity::portable_string).collect(),
            assignees: self.has_assignee.iter().map(Entity::portable_string).collect(),
            author: self.has_author.as_ref().map(Entity::portable_string),
            milestone: self.has_milestone.as_ref().map(Entity::portable_string),
            owner: self.has_owner.as_ref().map(Entity::portable_string),
        }
    }

    /// Back to the state before any body was interpreted.
    pub fn reset_computed(&mut self) {
        self.errors.clear();
        self.parents.clear();
        self.children.clear();
        self.duplicates.clear();
        self.weight = 0;
        self.is_hidden = false;
        self.is_epic = false;
        self.has_epic = false;
        self.is_orphan = true;
        self.is_blocking.clear();
        self.is_depending_on.clear();
        self.is_related_with.clear();
        self.is_part_of.clear();
        self.has_part.clear();
    }

    /// Fill the typed edge lists from the body's directive lines.
    pub fn apply_relationships(&mut self) {
        let (relationships, errors) = parse_relationships(&self.id, &self.body);
        for relationship in relationships {
            let target = relationship.target;
            if target == self.id {
                continue;
            }
            match relationship.kind {
                RelationshipKind::Blocks
                | RelationshipKind::Fixes
                | RelationshipKind::Closes
                | RelationshipKind::Addresses => self.is_blocking.push(target),
                RelationshipKind::DependsOn => self.is_depending_on.push(target),
                RelationshipKind::RelatedWith => self.is_related_with.push(target),
                RelationshipKind::PartOf => self.is_part_of.push(target),
                RelationshipKind::ParentOf => self.has_part.push(target),
            }
        }
        for list in [
            &mut self.is_blocking,
            &mut self.is_depending_on,
            &mut self.is_related_with,
            &mut self.is_part_of,
            &mut self.has_part,
        ] {
            list.sort();
            list.dedup();
        }
        self.errors.extend(errors.into_iter().map(|e| e.to_string()));
    }

    /// Dependencies in both directions: what this task waits on and what waits on it.
    pub fn all_deps(&self) -> impl Iterator<Item = &Entity> {
        self.is_depending_on.iter().chain(self.is_blocking.iter())
    }

    /// Every outgoing edge of the node, typed or derived.
    pub fn edges(&self) -> impl Iterator<Item = &Entity> {
        self.is_blocking
            .iter()
            .chain(&self.is_depending_on)
            .chain(&self.is_related_with)
            .chain(&self.is_part_of)
            .chain(&self.has_part)
            .chain(&self.parents)
            .chain(&self.children)
    }

    pub fn is_closed(&self) -> bool {
        self.state == TaskState::Closed
    }
}

/// A user, organization or repository node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Entity,
    pub kind: OwnerKind,
    pub title: String,
    pub description: String,
    pub has_owner: Option<Entity>,
}

impl Owner {
    pub fn from_raw(raw: &RawOwner) -> Result<Owner> {
        let id = decode(&raw.id, None)
            .map_err(|e| DepgraphError::InvalidRecord(format!("owner {:?}: {}", raw.id, e)))?;
        let has_owner = optional_reference(&id, raw.owner.as_deref(), "owner")
            .or_else(|| match id.kind() {
                Kind::Project | Kind::OrganizationOrProject => id.owner_entity(),
                _ => None,
            });
        Ok(Owner {
            id,
            kind: raw.kind,
            title: raw.title.clone(),
            description: raw.description.clone(),
            has_owner,
        })
    }

    pub fn to_raw(&self) -> RawOwner {
        RawOwner {
            id: self.id.portable_string(),
            kind: self.kind,
            title: self.title.clone(),
            description: self.description.clone(),
            owner: self.has_owner.as_ref().map(Entity::portable_string),
        }
    }
}

/// A label node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Entity,
    pub title: String,
    pub color: String,
    pub description: String,
    pub has_owner: Option<Entity>,
}

impl Topic {
    pub fn from_raw(raw: &RawTopic) -> Result<Topic> {
        let id = decode(&raw.id, None)
            .map_err(|e| DepgraphError::InvalidRecord(format!("topic {:?}: {}", raw.id, e)))?;
        let has_owner = optional_reference(&id, raw.owner.as_deref(), "owner").or_else(|| id.repo_entity());
        Ok(Topic {
            id,
            title: raw.title.clone(),
            color: raw.color.clone(),
            description: raw.description.clone(),
            has_owner,
        })
    }

    pub fn to_raw(&self) -> RawTopic {
        RawTopic {
            id: self.id.portable_string(),
            title: self.title.clone(),
            color: self.color.clone(),
            description: self.description.clone(),
            owner: self.has_owner.as_ref().map(Entity::portable_string),
        }
    }

    /// Display name: the title, or the name carried by the label id.
    pub fn name(&self) -> &str {
        if self.title.is_empty() {
            self.id.id().unwrap_or_default()
        } else {
            &self.title
        }
    }
}

/// Output of a build, every collection sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub tasks: Vec<Task>,
    pub owners: Vec<Owner>,
    pub topics: Vec<Topic>,
}

impl Graph {
    pub fn task(&self, id: &Entity) -> Option<&Task> {
        self.tasks
            .binary_search_by(|t| t.id.cmp(id))
            .ok()
            .map(|i| &self.tasks[i])
    }

    pub fn topic(&self, id: &Entity) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == *id)
    }
}

fn optional_reference(context: &Entity, raw: Option<&str>, field: &str) -> Option<Entity> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match decode(raw, Some(context)) {
        Ok(entity) => Some(entity),
        Err(e) => {
            log::warn!("Dropping {} {:?} of {}: {}", field, raw, context, e);
            None
        }
    }
}

/// Labels may come as ids (`moul/depviz/labels/bug`, full URLs) or bare names.
fn resolve_label(context: &Entity, raw: &str) -> Option<Entity> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('/') {
        if let Some(Entity::Repo(repo) | Entity::OwnerOrRepo(repo)) = context.repo_entity() {
            return Some(repo.label(raw));
        }
    }
    optional_reference(context, Some(raw), "label")
}
