//! Error handling for the job recommender

use crate::processing::snapshot::EntityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobbotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data integrity error for '{entity_id}': {reason}")]
    DataIntegrity { entity_id: String, reason: String },

    #[error("Cosine similarity is undefined for a zero-norm vector")]
    DegenerateVector,

    #[error("Embedding dimensions don't match: {0} vs {1}")]
    DimensionMismatch(usize, usize),

    #[error("Embedding backend failed while building {kind} snapshot: {message}")]
    Embedding { kind: EntityKind, message: String },

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl JobbotError {
    pub fn data_integrity(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        JobbotError::DataIntegrity {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    /// Per-entity problems that are skipped and counted instead of aborting a run.
    pub fn is_per_entity(&self) -> bool {
        matches!(
            self,
            JobbotError::DataIntegrity { .. }
                | JobbotError::DegenerateVector
                | JobbotError::DimensionMismatch(..)
                | JobbotError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, JobbotError>;

/// An entity left out of a run, with the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedEntity {
    pub entity_id: String,
    pub reason: String,
}

impl SkippedEntity {
    pub fn new(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    /// Prefer the id carried by the error itself when there is one.
    pub fn from_error(fallback_id: &str, err: &JobbotError) -> Self {
        match err {
            JobbotError::DataIntegrity { entity_id, reason } => Self::new(entity_id.clone(), reason.clone()),
            other => Self::new(fallback_id, other.to_string()),
        }
    }
}

/// Convert anyhow errors raised by the embedding model library
impl From<anyhow::Error> for JobbotError {
    fn from(err: anyhow::Error) -> Self {
        JobbotError::ModelError(err.to_string())
    }
}

impl From<reqwest::Error> for JobbotError {
    fn from(err: reqwest::Error) -> Self {
        JobbotError::Network(err.to_string())
    }
}

impl From<tempfile::PersistError> for JobbotError {
    fn from(err: tempfile::PersistError) -> Self {
        JobbotError::Storage(format!("Failed to publish {}: {}", err.file.path().display(), err.error))
    }
}
