use sha2::{Digest, Sha256};
use std::path::Path;

use super::walker::{BatchFile, BatchFormat};
use crate::error::{DepgraphError, Result};
use crate::graph::{Batch, RawRecord};

/// Compute SHA256 hash of file contents
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(DepgraphError::Io)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Parse a batch document: either a full `{records, owners, topics}` object
/// or a bare list of records.
pub fn parse_batch(content: &str, format: BatchFormat) -> Result<Batch> {
    match format {
        BatchFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(content)?;
            if value.is_array() {
                Ok(Batch {
                    records: serde_json::from_value::<Vec<RawRecord>>(value)?,
                    ..Batch::default()
                })
            } else {
                Ok(serde_json::from_value(value)?)
            }
        }
        BatchFormat::Yaml => {
            let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(content)?;
            if value.is_null() {
                return Ok(Batch::default());
            }
            if value.is_sequence() {
                Ok(Batch {
                    records: serde_yaml_ng::from_value::<Vec<RawRecord>>(value)?,
                    ..Batch::default()
                })
            } else {
                Ok(serde_yaml_ng::from_value(value)?)
            }
        }
    }
}

/// Read and parse one batch file.
pub fn read_batch(file: &BatchFile) -> Result<Batch> {
    let content = std::fs::read_to_string(&file.path).map_err(DepgraphError::Io)?;
    let batch = parse_batch(&content, file.format)?;
    log::debug!(
        "Read {}: {} records, {} owners, {} topics",
        file.key,
        batch.records.len(),
        batch.owners.len(),
        batch.topics.len()
    );
    Ok(batch)
}
