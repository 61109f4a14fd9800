use std::path::PathBuf;

/// Errors from building, opening or querying an index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedding backend failure; a build aborts without touching the stored index.
    #[error("embedding failed: {0}")]
    Embedding(#[from] lectern_llm::LlmError),

    #[error("no index at {}", .0.display())]
    NotFound(PathBuf),

    #[error("index at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("index was built with model {index:?} but the query embedder is {query:?}")]
    ModelMismatch { index: String, query: String },

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("entry {0} has a non-finite vector component")]
    NonFiniteVector(usize),

    #[error("k must be at least 1")]
    InvalidK,

    #[error("index at {} is locked by another build", .0.display())]
    Locked(PathBuf),

    #[error("source directory {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
