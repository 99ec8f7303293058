use rusqlite::Connection;
use std::path::Path;
use tokio::task;
use crate::error::{DepgraphError, Result};

// WAL for concurrent readers while an import writes; foreign keys on for imports.
const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -16384;";

/// SQLite handle for the graph store. Connections are opened per call.
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection with the store pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(DepgraphError::Database)?;
        conn.execute_batch(PRAGMAS)?;
        Ok(conn)
    }

    /// Run `f` on a fresh connection inside a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path).map_err(DepgraphError::Database)?;
            conn.execute_batch(PRAGMAS)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DepgraphError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

pub mod migrate;
