use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{DepgraphError, Result};
use super::batch::compute_file_hash;

/// Serialization of a batch file, from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Json,
    Yaml,
}

impl BatchFormat {
    pub fn from_path(path: &Path) -> Option<BatchFormat> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "json" => Some(BatchFormat::Json),
            "yaml" | "yml" => Some(BatchFormat::Yaml),
            _ => None,
        }
    }
}

/// A fetcher batch file found on disk
#[derive(Debug, Clone)]
pub struct BatchFile {
    /// Import key: the path as discovered, lossy UTF-8.
    pub key: String,
    pub path: PathBuf,
    pub format: BatchFormat,
    pub file_size: u64,
    pub file_hash: String,
}

fn batch_file(path: &Path, format: BatchFormat) -> Result<BatchFile> {
    let metadata = std::fs::metadata(path).map_err(DepgraphError::Io)?;
    Ok(BatchFile {
        key: path.to_string_lossy().to_string(),
        path: path.to_path_buf(),
        format,
        file_size: metadata.len(),
        file_hash: compute_file_hash(path)?,
    })
}

/// Batch files at `root`: the file itself, or every `.json`, `.yaml` and
/// `.yml` file below a directory, sorted by path.
pub fn discover_batches(root: &Path) -> Result<Vec<BatchFile>> {
    if !root.exists() {
        return Err(DepgraphError::InvalidInput(format!("{} does not exist", root.display())));
    }
    if root.is_file() {
        let format = BatchFormat::from_path(root).ok_or_else(|| {
            DepgraphError::InvalidInput(format!("{} is not a .json or .yaml batch", root.display()))
        })?;
        return Ok(vec![batch_file(root, format)?]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(format) = BatchFormat::from_path(path) else {
            log::debug!("Skipping {}", path.display());
            continue;
        };
        files.push(batch_file(path, format)?);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    log::info!("Discovered {} batch files in {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_batches_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("github")).unwrap();
        fs::write(root.join("github/b.yml"), "records: []").unwrap();
        fs::write(root.join("a.json"), "[]").unwrap();
        fs::write(root.join("c.YAML"), "records: []").unwrap();
        fs::write(root.join("notes.md"), "# not a batch").unwrap();

        let files = discover_batches(root).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.json", "c.YAML", "github/b.yml"]);
        assert_eq!(files[0].format, BatchFormat::Json);
        assert_eq!(files[1].format, BatchFormat::Yaml);
        assert_eq!(files[0].file_size, 2);
        assert_eq!(files[0].file_hash.len(), 64);
    }

    #[test]
    fn test_discover_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch.json");
        fs::write(&path, "[]").unwrap();
        let files = discover_batches(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key, path.to_string_lossy());
    }

    #[test]
    fn test_discover_rejects_bad_roots() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_batches(&temp_dir.path().join("missing")),
            Err(DepgraphError::InvalidInput(_))
        ));
        let text = temp_dir.path().join("notes.txt");
        fs::write(&text, "hello").unwrap();
        assert!(matches!(discover_batches(&text), Err(DepgraphError::InvalidInput(_))));
    }
}
