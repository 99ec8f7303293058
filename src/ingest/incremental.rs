//! Incremental import: skip batch files whose content hash is already recorded.

use std::collections::HashMap;

use super::walker::BatchFile;

/// Discovered batch files, split against the recorded import hashes.
#[derive(Debug, Default)]
pub struct FileClassification {
    /// Never imported.
    pub new_files: Vec<BatchFile>,
    /// Imported before with different content.
    pub modified_files: Vec<BatchFile>,
    /// Imported before with the same content.
    pub unchanged_files: Vec<BatchFile>,
}

impl FileClassification {
    /// Files that need an import, in discovery order.
    pub fn pending(&self) -> Vec<&BatchFile> {
        let mut pending: Vec<&BatchFile> = self.new_files.iter().chain(&self.modified_files).collect();
        pending.sort_by(|a, b| a.path.cmp(&b.path));
        pending
    }
}

/// Classify discovered files by comparing their hash with `existing_hashes`
/// (import key → file hash).
pub fn classify_files(files: &[BatchFile], existing_hashes: &HashMap<String, String>) -> FileClassification {
    let mut classification = FileClassification::default();
    for file in files {
        match existing_hashes.get(&file.key) {
            None => classification.new_files.push(file.clone()),
            Some(stored) if stored != &file.file_hash => classification.modified_files.push(file.clone()),
            Some(_) => classification.unchanged_files.push(file.clone()),
        }
    }
    classification
}
