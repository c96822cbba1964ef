//! Error taxonomy for the retrieval and indexing core.
//!
//! Every core component returns [`Result<T>`](Result). The HTTP layer maps
//! each variant onto a status code in [`server`](crate::server); the CLI wraps
//! them in `anyhow` at the top level.

use thiserror::Error;

/// Errors surfaced by the chunker, gateways, index, and coordinators.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking or retrieval configuration (e.g. overlap >= size).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A caller passed a bad parameter (empty question, `k == 0`, wrong dims).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding service failed permanently or exhausted its retries.
    #[error("embedding service unavailable after {attempts} attempt(s): {message}")]
    EmbeddingUnavailable { attempts: u32, message: String },

    /// The generation service failed after its retry.
    #[error("answer unavailable after {attempts} attempt(s): {message}")]
    AnswerUnavailable { attempts: u32, message: String },

    /// A reindex run was aborted part-way; the index may be partially populated.
    #[error("ingestion failed after {documents_processed} document(s): {source}")]
    IngestionFailed {
        documents_processed: usize,
        #[source]
        source: Box<RagError>,
    },

    /// Another reindex holds the writer lock.
    #[error("a reindex is already in progress")]
    IngestionInProgress,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn config(message: impl Into<String>) -> Self {
        RagError::Configuration(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        RagError::InvalidArgument(message.into())
    }
}
