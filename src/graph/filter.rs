//! Scope and visibility filters over a built graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::{Graph, Owner, Task, TaskKind, Topic};
use crate::entity::Entity;
use crate::error::{DepgraphError, Result};

/// Largest accepted scope; the scope walk is exponential in it.
pub const MAX_SCOPE_SIZE: usize = 10;

/// Query parameters of [`load`]. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub targets: Vec<Entity>,
    #[serde(default)]
    pub the_world: bool,
    #[serde(default)]
    pub with_closed: bool,
    #[serde(default)]
    pub without_isolated: bool,
    #[serde(default)]
    pub without_prs: bool,
    #[serde(default)]
    pub without_external_deps: bool,
    #[serde(default)]
    pub scope_size: usize,
}

impl Filters {
    fn check(&self) -> Result<()> {
        if self.targets.is_empty() && !self.the_world {
            return Err(DepgraphError::InvalidInput("missing filter.targets".to_string()));
        }
        if self.scope_size > MAX_SCOPE_SIZE {
            return Err(DepgraphError::InvalidInput(format!(
                "filter.scope_size {} is above {}",
                self.scope_size, MAX_SCOPE_SIZE
            )));
        }
        Ok(())
    }

    /// Equal to a target, under a target, or everything with `the_world`.
    fn matches(&self, id: &Entity) -> bool {
        self.the_world || self.targets.iter().any(|target| target == id || target.contains(id))
    }

    fn keeps(&self, task: &Task) -> bool {
        (self.with_closed || !task.is_closed()) && !(self.without_prs && task.kind == TaskKind::MergeRequest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    DependsOn,
    Blocking,
    RelatedWith,
    PartOf,
    HasPart,
}

impl Link {
    const TYPED: [Link; 5] = [
        Link::DependsOn,
        Link::Blocking,
        Link::RelatedWith,
        Link::PartOf,
        Link::HasPart,
    ];

    fn targets(self, task: &Task) -> &[Entity] {
        match self {
            Link::DependsOn => &task.is_depending_on,
            Link::Blocking => &task.is_blocking,
            Link::RelatedWith => &task.is_related_with,
            Link::PartOf => &task.is_part_of,
            Link::HasPart => &task.has_part,
        }
    }
}

/// Undirected neighbourhoods of the visible tasks, by index into `graph.tasks`.
struct Adjacency {
    by_link: Vec<(Link, Vec<Vec<usize>>)>,
}

impl Adjacency {
    fn new(graph: &Graph, index: &HashMap<String, usize>) -> Self {
        let by_link = Link::TYPED
            .iter()
            .map(|&link| {
                let mut neighbours = vec![Vec::new(); graph.tasks.len()];
                for &i in index.values() {
                    for target in link.targets(&graph.tasks[i]) {
                        if let Some(&j) = index.get(&target.canonical_string()) {
                            if i != j {
                                neighbours[i].push(j);
                                neighbours[j].push(i);
                            }
                        }
                    }
                }
                (link, neighbours)
            })
            .collect();
        Self { by_link }
    }

    fn step(&self, from: &BTreeSet<usize>, links: &[Link]) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        for (link, neighbours) in &self.by_link {
            if !links.contains(link) {
                continue;
            }
            for &i in from {
                reached.extend(neighbours[i].iter().copied());
            }
        }
        reached
    }
}

/// Every ordered sequence of `n` elements drawn from `elements`, repetition
/// allowed: `elements.len().pow(n)` sequences, lexicographic in input order.
pub fn generate_combinations_with_repetition<T: Clone>(n: usize, elements: &[T]) -> Vec<Vec<T>> {
    fn walk<T: Clone>(n: usize, elements: &[T], current: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if n == 0 {
            out.push(current.clone());
            return;
        }
        for element in elements {
            current.push(element.clone());
            walk(n - 1, elements, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    walk(n, elements, &mut Vec::with_capacity(n), &mut out);
    out
}

/// Widen `selected` by up to `scope_size` dependency hops. Any mix of
/// "follow dependency" and "follow dependent" steps counts.
fn expand_scope(adjacency: &Adjacency, selected: &BTreeSet<usize>, scope_size: usize) -> BTreeSet<usize> {
    let mut scope = selected.clone();
    if scope_size == 0 {
        return scope;
    }
    for sequence in generate_combinations_with_repetition(scope_size, &[Link::DependsOn, Link::Blocking]) {
        let mut frontier = selected.clone();
        for link in sequence {
            frontier = adjacency.step(&frontier, &[link]);
            if frontier.is_empty() {
                break;
            }
            scope.extend(frontier.iter().copied());
        }
    }
    scope
}

/// Visible tasks under `filters`, sorted by id.
///
/// Hidden tasks never show up, whatever the flags say.
pub fn load(graph: &Graph, filters: &Filters) -> Result<Vec<Task>> {
    filters.check()?;

    let index: HashMap<String, usize> = graph
        .tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| !task.is_hidden)
        .map(|(i, task)| (task.id.canonical_string(), i))
        .collect();

    let initial: BTreeSet<usize> = index
        .values()
        .copied()
        .filter(|&i| {
            let task = &graph.tasks[i];
            filters.matches(&task.id)
                || task
                    .has_milestone
                    .as_ref()
                    .map(|milestone| filters.targets.contains(milestone))
                    .unwrap_or(false)
        })
        .collect();

    let adjacency = Adjacency::new(graph, &index);
    let mut selected = expand_scope(&adjacency, &initial, filters.scope_size);
    selected.retain(|&i| filters.keeps(&graph.tasks[i]));

    if !filters.without_external_deps {
        let external = adjacency.step(&selected, &Link::TYPED);
        selected.extend(external.into_iter().filter(|&i| filters.keeps(&graph.tasks[i])));
    }

    let mut tasks: Vec<Task> = selected.into_iter().map(|i| graph.tasks[i].clone()).collect();
    if filters.without_isolated {
        tasks = filter_isolated(tasks);
    }
    tasks.sort_by(|a, b| a.id.cmp(&b.id));

    log::debug!(
        "Loaded {} of {} tasks (scope_size={}, the_world={})",
        tasks.len(),
        graph.tasks.len(),
        filters.scope_size,
        filters.the_world
    );
    Ok(tasks)
}

/// Drop tasks with no edge to or from another task of the set.
fn filter_isolated(tasks: Vec<Task>) -> Vec<Task> {
    let present: HashSet<String> = tasks.iter().map(|t| t.id.canonical_string()).collect();
    let mut connected = HashSet::new();
    for task in &tasks {
        for target in task.edges() {
            let target = target.canonical_string();
            if present.contains(&target) {
                connected.insert(target);
                connected.insert(task.id.canonical_string());
            }
        }
    }
    tasks
        .into_iter()
        .filter(|task| connected.contains(&task.id.canonical_string()))
        .collect()
}

/// Owners matching the targets or referenced by a visible task.
pub fn load_owners(graph: &Graph, filters: &Filters) -> Result<Vec<Owner>> {
    let tasks = load(graph, filters)?;
    let referenced: HashSet<String> = tasks
        .iter()
        .flat_map(|task| {
            task.has_owner
                .iter()
                .chain(task.has_author.iter())
                .chain(task.has_assignee.iter())
        })
        .map(|entity| entity.canonical_string())
        .collect();
    Ok(graph
        .owners
        .iter()
        .filter(|owner| filters.matches(&owner.id) || referenced.contains(&owner.id.canonical_string()))
        .cloned()
        .collect())
}

/// Topics matching the targets or carried as a label by a visible task.
pub fn load_topics(graph: &Graph, filters: &Filters) -> Result<Vec<Topic>> {
    let tasks = load(graph, filters)?;
    let referenced: HashSet<String> = tasks
        .iter()
        .flat_map(|task| task.has_label.iter())
        .map(|entity| entity.canonical_string())
        .collect();
    Ok(graph
        .topics
        .iter()
        .filter(|topic| filters.matches(&topic.id) || referenced.contains(&topic.id.canonical_string()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{decode, GITHUB_HOST};
    use crate::graph::{build, Batch, RawOwner, RawRecord, RawTopic, TaskState};

    fn record(id: &str, body: &str) -> RawRecord {
        RawRecord {
            id: format!("https://github.com/{}", id),
            title: id.to_string(),
            body: body.to_string(),
            ..RawRecord::default()
        }
    }

    fn target(input: &str) -> Entity {
        decode(input, None).unwrap()
    }

    fn ids(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(|t| t.local_id.clone()).collect()
    }

    fn graph(records: Vec<RawRecord>) -> Graph {
        build(&Batch {
            records,
            ..Batch::default()
        })
        .unwrap()
    }

    fn chain() -> Graph {
        graph(vec![
            record("moul/depviz/issues/1", "Depends on #2"),
            record("moul/depviz/issues/2", "Depends on #3"),
            record("moul/depviz/issues/3", "Depends on #4"),
            record("moul/depviz/issues/4", ""),
            record("moul/depviz/issues/5", "Blocks #2"),
        ])
    }

    #[test]
    fn test_missing_targets() {
        let err = load(&chain(), &Filters::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: missing filter.targets");
    }

    #[test]
    fn test_oversized_scope_is_rejected() {
        let filters = Filters {
            the_world: true,
            scope_size: 40,
            ..Filters::default()
        };
        let err = load(&chain(), &filters).unwrap_err();
        assert!(matches!(err, DepgraphError::InvalidInput(_)));
        assert!(err.to_string().contains("scope_size 40"));

        let filters = Filters {
            scope_size: MAX_SCOPE_SIZE,
            ..filters
        };
        assert_eq!(load(&chain(), &filters).unwrap().len(), 5);
    }

    #[test]
    fn test_combinations_with_repetition() {
        assert_eq!(
            generate_combinations_with_repetition(2, &['a', 'b']),
            vec![vec!['a', 'a'], vec!['a', 'b'], vec!['b', 'a'], vec!['b', 'b']]
        );
        assert_eq!(generate_combinations_with_repetition(3, &[1, 2]).len(), 8);
        assert_eq!(generate_combinations_with_repetition::<u8>(0, &[1, 2]), vec![Vec::<u8>::new()]);
        assert!(generate_combinations_with_repetition::<u8>(2, &[]).is_empty());
    }

    #[test]
    fn test_scope_grows_with_hops() {
        let graph = chain();
        let filters = |scope_size| Filters {
            targets: vec![target("moul/depviz#1")],
            without_external_deps: true,
            scope_size,
            ..Filters::default()
        };
        assert_eq!(ids(&load(&graph, &filters(0)).unwrap()), vec!["moul/depviz#1"]);
        assert_eq!(
            ids(&load(&graph, &filters(1)).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2"]
        );
        // two hops mix directions: 1 -> 2 <- 5
        assert_eq!(
            ids(&load(&graph, &filters(2)).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2", "moul/depviz#3", "moul/depviz#5"]
        );
    }

    #[test]
    fn test_external_deps_add_one_hop() {
        let graph = chain();
        let filters = Filters {
            targets: vec![target("moul/depviz#1")],
            ..Filters::default()
        };
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2"]
        );
    }

    #[test]
    fn test_repo_target_and_external_deps() {
        let graph = graph(vec![
            record("moul/depviz/issues/1", "Depends on other/repo#5"),
            record("moul/depviz/issues/2", ""),
            record("other/repo/issues/5", ""),
            record("other/repo/issues/6", ""),
        ]);
        let mut filters = Filters {
            targets: vec![target("github.com/moul/depviz")],
            ..Filters::default()
        };
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2", "other/repo#5"]
        );
        filters.without_external_deps = true;
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2"]
        );
        filters.targets = vec![target("@other")];
        assert_eq!(ids(&load(&graph, &filters).unwrap()), vec!["other/repo#5", "other/repo#6"]);
    }

    #[test]
    fn test_closed_and_pr_filters() {
        let mut closed = record("moul/depviz/issues/2", "");
        closed.state = TaskState::Closed;
        let mut pr = record("moul/depviz/issues/3", "Fixes #1");
        pr.kind = TaskKind::MergeRequest;
        let graph = graph(vec![record("moul/depviz/issues/1", "Depends on #2"), closed, pr]);

        let mut filters = Filters {
            the_world: true,
            ..Filters::default()
        };
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#3"]
        );
        filters.with_closed = true;
        filters.without_prs = true;
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2"]
        );
    }

    #[test]
    fn test_without_isolated() {
        let graph = graph(vec![
            record("moul/depviz/issues/1", "Depends on #2"),
            record("moul/depviz/issues/2", ""),
            record("moul/depviz/issues/3", ""),
        ]);
        let filters = Filters {
            the_world: true,
            without_isolated: true,
            ..Filters::default()
        };
        assert_eq!(
            ids(&load(&graph, &filters).unwrap()),
            vec!["moul/depviz#1", "moul/depviz#2"]
        );
    }

    #[test]
    fn test_hidden_task_is_never_loaded() {
        let graph = graph(vec![
            record("moul/depviz/issues/1", "depviz.hide"),
            record("moul/depviz/issues/2", "Depends on #1"),
        ]);
        assert_eq!(
            graph.task(&target("moul/depviz#2")).unwrap().is_depending_on,
            vec![target("moul/depviz#1")]
        );
        let filters = Filters {
            targets: vec![target("moul/depviz#1"), target("moul/depviz#2")],
            the_world: true,
            with_closed: true,
            scope_size: 3,
            ..Filters::default()
        };
        assert_eq!(ids(&load(&graph, &filters).unwrap()), vec!["moul/depviz#2"]);
    }

    #[test]
    fn test_milestone_target_selects_its_tasks() {
        let mut planned = record("moul/depviz/issues/1", "");
        planned.milestone = Some("moul/depviz/milestone/7".to_string());
        let graph = graph(vec![planned, record("moul/depviz/issues/2", "")]);
        let filters = Filters {
            targets: vec![Entity::github_milestone(GITHUB_HOST, "moul", "depviz", "7")],
            ..Filters::default()
        };
        assert_eq!(ids(&load(&graph, &filters).unwrap()), vec!["moul/depviz#1"]);
    }

    #[test]
    fn test_owners_and_topics_follow_visible_tasks() {
        let mut first = record("moul/depviz/issues/1", "");
        first.author = Some("@alice".to_string());
        first.labels = vec!["bug".to_string()];
        let graph = build(&Batch {
            records: vec![first, record("other/repo/issues/1", "")],
            owners: vec![
                RawOwner {
                    id: "https://github.com/alice".to_string(),
                    ..RawOwner::default()
                },
                RawOwner {
                    id: "https://github.com/bob".to_string(),
                    ..RawOwner::default()
                },
            ],
            topics: vec![
                RawTopic {
                    id: "https://github.com/moul/depviz/labels/bug".to_string(),
                    ..RawTopic::default()
                },
                RawTopic {
                    id: "https://github.com/other/repo/labels/bug".to_string(),
                    ..RawTopic::default()
                },
            ],
        })
        .unwrap();
        let filters = Filters {
            targets: vec![target("github.com/moul/depviz")],
            ..Filters::default()
        };

        let owners = load_owners(&graph, &filters).unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id.local_id(), "@alice");

        let topics = load_topics(&graph, &filters).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].id.canonical_string(), "https://github.com/moul/depviz/labels/bug");
    }
}
