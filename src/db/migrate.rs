use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use crate::error::{DepgraphError, Result};

/// Migration metadata
struct Migration {
    version: u32,
    name: String,
    sql: String,
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Names of applied migrations, oldest first
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(DepgraphError::Database)?;
    Ok(names)
}

/// Read `NNN_name.sql` files from `migrations_dir`, ordered by version
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let entries = fs::read_dir(migrations_dir).map_err(DepgraphError::Io)?;

    let mut migrations = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DepgraphError::Config("Invalid migration filename".to_string()))?;

        let version_str = filename.split('_').next().unwrap_or_default();
        let version: u32 = version_str
            .parse()
            .map_err(|_| DepgraphError::Config(format!("Invalid migration version: {}", filename)))?;

        let sql = fs::read_to_string(&path).map_err(DepgraphError::Io)?;
        let name = filename.trim_end_matches(".sql").to_string();
        migrations.push(Migration { version, name, sql });
    }

    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].version == pair[1].version) {
        return Err(DepgraphError::Config(format!(
            "Duplicate migration version {}: {} and {}",
            pair[0].version, pair[0].name, pair[1].name
        )));
    }
    Ok(migrations)
}

/// Apply every pending migration, each in its own transaction
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;
    let migrations = load_migrations(migrations_dir)?;

    for migration in migrations {
        if applied.contains(&migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql).map_err(|e| {
            DepgraphError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("Failed to execute migration {}: {}", migration.name, e)),
            ))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    Ok(())
}
