pub mod walker;
pub mod batch;
pub mod incremental;

pub use walker::{BatchFile, BatchFormat, discover_batches};
pub use batch::{compute_file_hash, parse_batch, read_batch};
pub use incremental::{FileClassification, classify_files};

use std::path::Path;

use crate::db::Db;
use crate::error::Result;
use crate::graph::{build_with, Batch, GraphConfig};
use crate::store::{self, SaveStats};

/// Outcome of [`import_batches`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub discovered: usize,
    pub imported: usize,
    pub skipped: usize,
    pub records: usize,
    pub saved: SaveStats,
}

/// Import the batch files under `root` into the store.
///
/// Orchestrates discover → classify → read → build → save. The stored graph
/// is rebuilt together with the new records so that references across
/// batches resolve; newer records win. Unchanged files are skipped unless
/// `force` is set.
pub async fn import_batches(db: &Db, root: &Path, config: &GraphConfig, force: bool) -> Result<ImportSummary> {
    let files = discover_batches(root)?;
    let existing = store::get_import_hashes(db).await?;
    let classification = classify_files(&files, &existing);

    let pending: Vec<&BatchFile> = if force {
        files.iter().collect()
    } else {
        classification.pending()
    };
    let mut summary = ImportSummary {
        discovered: files.len(),
        skipped: files.len() - pending.len(),
        ..ImportSummary::default()
    };
    if pending.is_empty() {
        log::info!("No new or modified batch files in {}", root.display());
        return Ok(summary);
    }

    let mut incoming = Batch::default();
    let mut counts = Vec::with_capacity(pending.len());
    for file in &pending {
        let batch = read_batch(file)?;
        counts.push(batch.records.len());
        incoming.extend(batch);
    }
    summary.imported = pending.len();
    summary.records = incoming.records.len();

    let stored = store::load_graph(db).await?;
    let merged = Batch::merge([Batch::from_graph(&stored), incoming]);
    let graph = build_with(&merged, config)?;

    let with_errors = graph.tasks.iter().filter(|t| !t.errors.is_empty()).count();
    if with_errors > 0 {
        log::warn!("{} tasks carry unresolved references or depth errors", with_errors);
    }

    summary.saved = store::save_graph(db, &graph).await?;
    for (file, count) in pending.iter().zip(counts) {
        store::record_import(db, &file.key, &file.file_hash, count).await?;
    }

    log::info!(
        "Imported {} of {} batch files ({} records)",
        summary.imported,
        summary.discovered,
        summary.records
    );
    Ok(summary)
}
