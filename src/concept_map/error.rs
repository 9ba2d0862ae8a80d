use std::path::PathBuf;

/// Failures raised by the concept-map store and its migration path.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document exists but cannot be read as a concept map
    #[error("concept map {} is corrupt: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// The legacy backup could not be taken; the original file is untouched
    #[error("migration of {} aborted: {reason}", path.display())]
    Migration { path: PathBuf, reason: String },

    #[error("topic '{0}' already exists")]
    TopicExists(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    /// An empty `topic_id` means no topic owns the concept
    #[error("concept '{concept_id}' not found in {}", scope(topic_id))]
    ConceptNotFound { topic_id: String, concept_id: String },

    /// Rejected input (out-of-range score, malformed concept payload)
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn scope(topic_id: &str) -> String {
    if topic_id.is_empty() {
        "any topic".to_string()
    } else {
        format!("topic '{}'", topic_id)
    }
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
