use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Document is not readable: {0}")]
    UnreadableDocument(String),

    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt record for document {document_id}: {reason}")]
    CorruptRecord { document_id: String, reason: String },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod indexer;
pub mod retrieval;
pub mod server;
pub mod store;
pub mod workflow;
