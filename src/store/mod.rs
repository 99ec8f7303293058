//! Graph persistence on top of [`Db`].
//!
//! Nodes are stored whole as JSON next to a few indexed columns. Saving a
//! node deletes its row and inserts it again inside one transaction per graph.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use crate::db::Db;
use crate::entity::Entity;
use crate::error::{DepgraphError, Result};
use crate::graph::{Graph, Owner, Task, Topic};

/// Row counts written by [`save_graph`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveStats {
    pub tasks: usize,
    pub owners: usize,
    pub topics: usize,
}

struct TaskRow {
    id: String,
    kind: &'static str,
    state: &'static str,
    has_owner: Option<String>,
    updated_at: Option<String>,
    data: String,
}

struct NodeRow {
    id: String,
    kind: Option<&'static str>,
    has_owner: Option<String>,
    data: String,
}

fn task_row(task: &Task) -> Result<TaskRow> {
    Ok(TaskRow {
        id: task.id.canonical_string(),
        kind: task.kind.as_str(),
        state: task.state.as_str(),
        has_owner: task.has_owner.as_ref().map(Entity::canonical_string),
        updated_at: task.updated_at.map(|t| t.to_rfc3339()),
        data: serde_json::to_string(task)?,
    })
}

fn owner_row(owner: &Owner) -> Result<NodeRow> {
    Ok(NodeRow {
        id: owner.id.canonical_string(),
        kind: Some(owner.kind.as_str()),
        has_owner: owner.has_owner.as_ref().map(Entity::canonical_string),
        data: serde_json::to_string(owner)?,
    })
}

fn topic_row(topic: &Topic) -> Result<NodeRow> {
    Ok(NodeRow {
        id: topic.id.canonical_string(),
        kind: None,
        has_owner: topic.has_owner.as_ref().map(Entity::canonical_string),
        data: serde_json::to_string(topic)?,
    })
}

/// Persist every node of `graph`, replacing rows with the same id.
pub async fn save_graph(db: &Db, graph: &Graph) -> Result<SaveStats> {
    let tasks = graph.tasks.iter().map(task_row).collect::<Result<Vec<_>>>()?;
    let owners = graph.owners.iter().map(owner_row).collect::<Result<Vec<_>>>()?;
    let topics = graph.topics.iter().map(topic_row).collect::<Result<Vec<_>>>()?;

    let stats = db
        .with_connection(move |conn| {
            let tx = conn.transaction()?;
            for row in &tasks {
                tx.execute("DELETE FROM tasks WHERE id = ?1", params![row.id])?;
                tx.execute(
                    "INSERT INTO tasks (id, kind, state, has_owner, updated_at, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![row.id, row.kind, row.state, row.has_owner, row.updated_at, row.data],
                )?;
            }
            for row in &owners {
                tx.execute("DELETE FROM owners WHERE id = ?1", params![row.id])?;
                tx.execute(
                    "INSERT INTO owners (id, kind, has_owner, data) VALUES (?1, ?2, ?3, ?4)",
                    params![row.id, row.kind.unwrap_or_default(), row.has_owner, row.data],
                )?;
            }
            for row in &topics {
                tx.execute("DELETE FROM topics WHERE id = ?1", params![row.id])?;
                tx.execute(
                    "INSERT INTO topics (id, has_owner, data) VALUES (?1, ?2, ?3)",
                    params![row.id, row.has_owner, row.data],
                )?;
            }
            tx.commit()?;
            Ok::<SaveStats, DepgraphError>(SaveStats {
                tasks: tasks.len(),
                owners: owners.len(),
                topics: topics.len(),
            })
        })
        .await?;

    log::info!(
        "Saved graph: {} tasks, {} owners, {} topics",
        stats.tasks,
        stats.owners,
        stats.topics
    );
    Ok(stats)
}

fn read_rows(conn: &rusqlite::Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("SELECT id, data FROM {} ORDER BY id", table))?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Decode a stored node, checking that it still maps to its own key.
fn decode_row<T, F>(table: &str, id: &str, data: &str, key: F) -> Result<T>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&T) -> String,
{
    let node: T = serde_json::from_str(data)
        .map_err(|e| DepgraphError::InvalidRecord(format!("{} row {:?}: {}", table, id, e)))?;
    let stored = key(&node);
    if stored != id {
        return Err(DepgraphError::InvalidRecord(format!(
            "{} row {:?} decodes to {:?}",
            table, id, stored
        )));
    }
    Ok(node)
}

/// Read the whole stored graph back, every collection sorted by id.
pub async fn load_graph(db: &Db) -> Result<Graph> {
    let (task_rows, owner_rows, topic_rows) = db
        .with_connection(|conn| Ok((read_rows(conn, "tasks")?, read_rows(conn, "owners")?, read_rows(conn, "topics")?)))
        .await?;

    let mut tasks = task_rows
        .iter()
        .map(|(id, data)| decode_row("tasks", id, data, |t: &Task| t.id.canonical_string()))
        .collect::<Result<Vec<Task>>>()?;
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    let mut owners = owner_rows
        .iter()
        .map(|(id, data)| decode_row("owners", id, data, |o: &Owner| o.id.canonical_string()))
        .collect::<Result<Vec<Owner>>>()?;
    owners.sort_by(|a, b| a.id.cmp(&b.id));
    let mut topics = topic_rows
        .iter()
        .map(|(id, data)| decode_row("topics", id, data, |t: &Topic| t.id.canonical_string()))
        .collect::<Result<Vec<Topic>>>()?;
    topics.sort_by(|a, b| a.id.cmp(&b.id));

    log::debug!("Loaded graph: {} tasks, {} owners, {} topics", tasks.len(), owners.len(), topics.len());
    Ok(Graph { tasks, owners, topics })
}

/// Most recent `updated_at` among the tasks owned by `repo`, if any.
pub async fn last_updated_in_repo(db: &Db, repo: &Entity) -> Result<Option<DateTime<Utc>>> {
    let owner = repo.canonical_string();
    let latest: Option<String> = db
        .with_connection(move |conn| {
            let value = conn
                .query_row(
                    "SELECT MAX(updated_at) FROM tasks WHERE has_owner = ?1",
                    params![owner],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
            Ok::<Option<String>, DepgraphError>(value)
        })
        .await?;

    latest
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DepgraphError::InvalidRecord(format!("updated_at {:?}: {}", raw, e)))
        })
        .transpose()
}

/// Stored content hashes of imported batch files, by path.
pub async fn get_import_hashes(db: &Db) -> Result<HashMap<String, String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT path, file_hash FROM imports")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut map = HashMap::new();
        for row in rows {
            let (path, hash) = row?;
            map.insert(path, hash);
        }
        Ok::<HashMap<String, String>, DepgraphError>(map)
    })
    .await
}

/// Remember that `path` was imported with content hash `file_hash`.
pub async fn record_import(db: &Db, path: &str, file_hash: &str, records: usize) -> Result<()> {
    let path = path.to_string();
    let file_hash = file_hash.to_string();
    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO imports (path, file_hash, records, imported_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(path) DO UPDATE SET
                file_hash = excluded.file_hash,
                records = excluded.records,
                imported_at = excluded.imported_at",
            params![path, file_hash, records as i64],
        )?;
        Ok::<(), DepgraphError>(())
    })
    .await
}
