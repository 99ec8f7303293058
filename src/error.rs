use thiserror::Error;

/// Main error type for depgraph
#[derive(Error, Debug)]
pub enum DepgraphError {
    /// Input matches no known forge grammar
    #[error("ambiguous uri {0:?}")]
    AmbiguousUri(String),

    /// A relationship directive points at something that could not be resolved
    #[error("{relation} {target:?} not found")]
    UnresolvedReference { relation: String, target: String },

    /// Epic propagation walked past the depth guard
    #[error("very high blocking depth (>{limit}), do not continue. (task={task})")]
    ExcessiveDepth { limit: usize, task: String },

    /// A directive carried a value that could not be interpreted
    #[error("invalid value {value:?} for directive {directive}")]
    InvalidDirectiveValue { directive: String, value: String },

    /// Structurally broken record (missing or undecodable id, garbage row)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML batch decoding errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Convenient Result type using DepgraphError
pub type Result<T> = std::result::Result<T, DepgraphError>;
