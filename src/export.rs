//! Rendering of a filtered task list: pretty JSON, CSV rows and a plain-text
//! debug tree.

use serde::Serialize;

use crate::entity::Entity;
use crate::error::Result;
use crate::graph::{Owner, Task, Topic};

/// The visible part of a graph, as printed by `depgraph graph`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct View {
    pub tasks: Vec<Task>,
    pub owners: Vec<Owner>,
    pub topics: Vec<Topic>,
}

pub fn to_json(view: &View) -> Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

pub const CSV_HEADER: [&str; 12] = [
    "id",
    "created_at",
    "updated_at",
    "local_id",
    "kind",
    "title",
    "body",
    "state",
    "weight",
    "author",
    "owner",
    "errors",
];

/// One CSV row, in [`CSV_HEADER`] order.
pub fn csv_row(task: &Task) -> Vec<String> {
    vec![
        task.id.canonical_string(),
        task.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        task.updated_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        task.local_id.clone(),
        task.kind.as_str().to_string(),
        task.title.clone(),
        task.body.clone(),
        task.state.as_str().to_string(),
        task.weight.to_string(),
        optional(&task.has_author),
        optional(&task.has_owner),
        task.errors.join("; "),
    ]
}

fn optional(entity: &Option<Entity>) -> String {
    entity.as_ref().map(Entity::canonical_string).unwrap_or_default()
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Header line plus one line per task, CRLF-free.
pub fn to_csv(tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');
    for task in tasks {
        let row: Vec<String> = csv_row(task).iter().map(|f| escape_csv(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// `[state] kind id  title` plus the derived flags that are set.
pub fn debug_line(task: &Task, use_local_id: bool) -> String {
    let id = if use_local_id {
        task.local_id.clone()
    } else {
        task.id.canonical_string()
    };
    let mut line = format!("[{}] {} {}", task.state.as_str(), task.kind.as_str(), id);
    if !task.title.is_empty() {
        line.push_str("  ");
        line.push_str(&task.title);
    }
    let mut flags = Vec::new();
    if task.is_epic {
        flags.push("epic".to_string());
    }
    if task.has_epic {
        flags.push("in-epic".to_string());
    }
    if task.is_orphan {
        flags.push("orphan".to_string());
    }
    if task.weight > 0 {
        flags.push(format!("weight={}", task.weight));
    }
    if !task.errors.is_empty() {
        flags.push(format!("errors={}", task.errors.len()));
    }
    if !flags.is_empty() {
        line.push_str(&format!(" ({})", flags.join(", ")));
    }
    line
}

pub fn debug_tree(tasks: &[Task], use_local_id: bool, with_relationships: bool) -> String {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&debug_line(task, use_local_id));
        out.push('\n');
        if !with_relationships {
            continue;
        }
        let single = [
            ("hasAuthor", &task.has_author),
            ("hasOwner", &task.has_owner),
            ("hasMilestone", &task.has_milestone),
        ];
        for (name, target) in single {
            if let Some(target) = target {
                out.push_str(&edge_line(name, target));
            }
        }
        let lists = [
            ("isDependingOn", &task.is_depending_on),
            ("isBlocking", &task.is_blocking),
            ("hasLabel", &task.has_label),
            ("hasAssignee", &task.has_assignee),
            ("isRelatedWith", &task.is_related_with),
            ("isPartOf", &task.is_part_of),
            ("hasPart", &task.has_part),
            ("parent", &task.parents),
            ("child", &task.children),
            ("duplicate", &task.duplicates),
        ];
        for (name, targets) in lists {
            for target in targets {
                out.push_str(&edge_line(name, target));
            }
        }
    }
    out
}

fn edge_line(name: &str, target: &Entity) -> String {
    format!("    {:<13} --> {}\n", name, target.canonical_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build, Batch, RawRecord, TaskState};

    fn tasks() -> Vec<Task> {
        let batch = Batch {
            records: vec![
                RawRecord {
                    id: "moul/depviz#1".to_string(),
                    title: "Epic, \"quoted\"".to_string(),
                    labels: vec!["epic".to_string()],
                    ..RawRecord::default()
                },
                RawRecord {
                    id: "moul/depviz#2".to_string(),
                    title: "child".to_string(),
                    body: "blocks #1\nline two".to_string(),
                    state: TaskState::Closed,
                    author: Some("@moul".to_string()),
                    ..RawRecord::default()
                },
            ],
            ..Batch::default()
        };
        build(&batch).unwrap().tasks
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_rows() {
        let tasks = tasks();
        let row = csv_row(&tasks[1]);
        assert_eq!(row.len(), CSV_HEADER.len());
        assert_eq!(row[0], "https://github.com/moul/depviz/issues/2");
        assert_eq!(row[3], "moul/depviz#2");
        assert_eq!(row[7], "closed");
        assert_eq!(row[9], "https://github.com/moul");
        assert_eq!(row[10], "https://github.com/moul/depviz");

        let csv = to_csv(&tasks);
        assert!(csv.starts_with("id,created_at,updated_at,local_id,kind,title,"));
        assert!(csv.contains("\"Epic, \"\"quoted\"\"\""));
        assert!(csv.contains("\"blocks #1\nline two\""));
    }

    #[test]
    fn test_debug_tree() {
        let tasks = tasks();
        let short = debug_tree(&tasks, true, false);
        assert_eq!(short.lines().count(), 2);
        assert!(short.starts_with("[open] issue moul/depviz#1  Epic, \"quoted\" (epic, in-epic)"));
        assert!(short.contains("[closed] issue moul/depviz#2  child (in-epic)"));

        let full = debug_tree(&tasks, false, true);
        assert!(full.contains("    isBlocking    --> https://github.com/moul/depviz/issues/1\n"));
        assert!(full.contains("    parent        --> https://github.com/moul/depviz/issues/1\n"));
        assert!(full.contains("    child         --> https://github.com/moul/depviz/issues/2\n"));
        assert!(full.contains("    hasOwner      --> https://github.com/moul/depviz\n"));
    }

    #[test]
    fn test_to_json() {
        let view = View {
            tasks: tasks(),
            ..View::default()
        };
        let json = to_json(&view).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(value["tasks"][0]["id"], "https://github.com/moul/depviz/issues/1");
        assert!(value["owners"].as_array().unwrap().is_empty());
    }
}
