//! Graph builder.
//!
//! Multi-pass and single-threaded: every task of the batch must be present
//! before the first pass, because inline references are resolved against the
//! whole batch and epic status is read from neighbours while it is written.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{Batch, Graph, Owner, Task, Topic};
use crate::entity::{decode, Entity};
use crate::error::{DepgraphError, Result};
use crate::grammar::directives;

/// Tunables of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Label names that make a task an epic.
    #[serde(default = "default_epic_labels")]
    pub epic_labels: Vec<String>,
    /// Depth guard of the upward epic walk.
    #[serde(default = "default_max_epic_depth")]
    pub max_epic_depth: usize,
}

fn default_epic_labels() -> Vec<String> {
    vec!["epic".to_string(), "t/epic".to_string()]
}

fn default_max_epic_depth() -> usize {
    100
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            epic_labels: default_epic_labels(),
            max_epic_depth: default_max_epic_depth(),
        }
    }
}

/// Build with default settings.
pub fn build(batch: &Batch) -> Result<Graph> {
    build_with(batch, &GraphConfig::default())
}

/// Build a graph from a fully materialized batch.
///
/// Records sharing an id are collapsed, the last one wins. Per-task problems
/// end up in `Task::errors`; only a record whose own id cannot be decoded
/// aborts the build.
pub fn build_with(batch: &Batch, config: &GraphConfig) -> Result<Graph> {
    let mut by_id = BTreeMap::new();
    for record in &batch.records {
        let task = Task::from_record(record)?;
        by_id.insert(task.id.canonical_string(), task);
    }
    let mut tasks: Vec<Task> = by_id.into_values().collect();

    let mut owners = BTreeMap::new();
    for raw in &batch.owners {
        let owner = Owner::from_raw(raw)?;
        owners.insert(owner.id.canonical_string(), owner);
    }
    let mut topics = BTreeMap::new();
    for raw in &batch.topics {
        let topic = Topic::from_raw(raw)?;
        topics.insert(topic.id.canonical_string(), topic);
    }
    let topic_names: HashMap<&str, &str> = topics
        .iter()
        .map(|(id, topic)| (id.as_str(), topic.name()))
        .collect();

    let index: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.id.canonical_string(), i))
        .collect();

    for task in tasks.iter_mut() {
        task.reset_computed();
        task.apply_relationships();
        task.is_epic = has_epic_label(task, &topic_names, &config.epic_labels);
    }

    for i in 0..tasks.len() {
        link_inline_directives(&mut tasks, &index, i);
    }

    for task in tasks.iter_mut() {
        for list in [&mut task.parents, &mut task.children, &mut task.duplicates] {
            list.sort();
            list.dedup();
        }
    }

    let mut memo = vec![None; tasks.len()];
    let epic_results: Vec<Result<bool>> = (0..tasks.len())
        .map(|i| {
            if tasks[i].is_epic {
                Ok(true)
            } else {
                compute_has_epic(&tasks, &index, i, 0, config.max_epic_depth, &mut memo)
            }
        })
        .collect();
    for (task, result) in tasks.iter_mut().zip(epic_results) {
        match result {
            Ok(has_epic) => task.has_epic = has_epic,
            Err(e) => {
                log::warn!("Epic propagation stopped for {}: {}", task.id, e);
                task.has_epic = false;
                task.errors.push(e.to_string());
            }
        }
    }

    let graph = Graph {
        tasks,
        owners: owners.into_values().collect(),
        topics: topics.into_values().collect(),
    };
    log::info!(
        "Built graph: {} tasks, {} owners, {} topics",
        graph.tasks.len(),
        graph.owners.len(),
        graph.topics.len()
    );
    Ok(graph)
}

fn has_epic_label(task: &Task, topic_names: &HashMap<&str, &str>, epic_labels: &[String]) -> bool {
    task.has_label.iter().any(|label| {
        let canonical = label.canonical_string();
        let name = topic_names
            .get(canonical.as_str())
            .copied()
            .or_else(|| label.id())
            .unwrap_or_default();
        epic_labels.iter().any(|epic| epic == name)
    })
}

/// Resolve an inline reference against the batch.
fn lookup(context: &Entity, reference: &str, index: &HashMap<String, usize>, relation: &str) -> Result<usize> {
    let decoded = decode(reference, Some(context));
    let target = match &decoded {
        Ok(entity) => entity.canonical_string(),
        Err(_) => reference.to_string(),
    };
    index
        .get(&target)
        .copied()
        .filter(|_| decoded.is_ok())
        .ok_or_else(|| DepgraphError::UnresolvedReference {
            relation: relation.to_string(),
            target,
        })
}

fn link(tasks: &mut [Task], parent: usize, child: usize) {
    let parent_id = tasks[parent].id.clone();
    let child_id = tasks[child].id.clone();
    tasks[parent].children.push(child_id);
    tasks[parent].is_orphan = false;
    tasks[child].parents.push(parent_id);
    tasks[child].is_orphan = false;
}

fn link_inline_directives(tasks: &mut [Task], index: &HashMap<String, usize>, i: usize) {
    let body = tasks[i].body.clone();
    let context = tasks[i].id.clone();

    if directives::is_hidden(&body) {
        tasks[i].is_hidden = true;
        return;
    }

    if let Some(reference) = directives::duplicate_of(&body) {
        match lookup(&context, reference, index, "duplicate") {
            Ok(j) if j == i => {}
            Ok(j) => {
                let original = tasks[j].id.clone();
                tasks[i].duplicates.push(original);
                tasks[i].is_hidden = true;
            }
            Err(e) => tasks[i].errors.push(e.to_string()),
        }
        return;
    }

    match directives::weight(&body) {
        Some(Ok(weight)) => tasks[i].weight = weight,
        Some(Err(e)) => log::warn!("Ignoring weight of {}: {}", context, e),
        None => {}
    }

    for reference in directives::children(&body) {
        match lookup(&context, reference, index, "children") {
            Ok(j) if j == i => {}
            Ok(j) => link(tasks, i, j),
            Err(e) => tasks[i].errors.push(e.to_string()),
        }
    }

    for reference in directives::parents(&body) {
        match lookup(&context, reference, index, "parent") {
            Ok(j) if j == i => {}
            Ok(j) => link(tasks, j, i),
            Err(e) => tasks[i].errors.push(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Visit {
    /// Settled without error when first reached at this depth.
    Done(bool, usize),
    /// Ran past the limit when reached at this depth.
    Failed(usize),
}

/// Walk parents upward looking for an epic.
///
/// A result computed without error at some depth holds for any shallower
/// start; a failure at some depth holds for any deeper one. The first parent
/// that fails aborts the walk.
fn compute_has_epic(
    tasks: &[Task],
    index: &HashMap<String, usize>,
    node: usize,
    depth: usize,
    limit: usize,
    memo: &mut [Option<Visit>],
) -> Result<bool> {
    let too_deep = || DepgraphError::ExcessiveDepth {
        limit,
        task: tasks[node].id.to_string(),
    };
    if depth > limit {
        return Err(too_deep());
    }
    match memo[node] {
        Some(Visit::Done(value, at)) if depth <= at => return Ok(value),
        Some(Visit::Failed(at)) if depth >= at => return Err(too_deep()),
        _ => {}
    }
    let task = &tasks[node];
    if task.is_hidden {
        return Ok(false);
    }

    for parent in &task.parents {
        let Some(&p) = index.get(&parent.canonical_string()) else {
            continue;
        };
        if tasks[p].is_epic {
            memo[node] = Some(Visit::Done(true, depth));
            return Ok(true);
        }
        match compute_has_epic(tasks, index, p, depth + 1, limit, memo) {
            Ok(true) => {
                memo[node] = Some(Visit::Done(true, depth));
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => {
                memo[node] = Some(Visit::Failed(depth));
                return Err(e);
            }
        }
    }

    memo[node] = Some(Visit::Done(false, depth));
    Ok(false)
}
