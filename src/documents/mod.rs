// Document intake and lifecycle tracking
// Uploads live as one file per document id; text extraction is a pluggable
// collaborator so the core never parses document formats itself

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{VectorStore, validate_document_id};
use crate::{RagError, Result};

/// Turns uploaded bytes into extracted text.
///
/// Kept deliberately opaque: the service stores raw uploads and hands them to
/// whichever extractor is configured. Extraction failures surface as
/// `UnreadableDocument`.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Extractor for documents that are already UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    #[inline]
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RagError::UnreadableDocument(format!("not valid UTF-8: {e}")))
    }
}

/// Uploads root: one raw document file per document id.
pub struct DocumentIntake {
    root: PathBuf,
}

impl DocumentIntake {
    #[inline]
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Persist uploaded bytes under a freshly generated document id.
    #[inline]
    pub async fn save(&self, bytes: &[u8]) -> Result<String> {
        let document_id = Uuid::new_v4().to_string();
        fs::write(self.document_path(&document_id), bytes).await?;
        info!("Saved uploaded document {}", document_id);
        Ok(document_id)
    }

    /// Read back the raw bytes for `document_id`, or `NotFound`.
    #[inline]
    pub async fn load(&self, document_id: &str) -> Result<Vec<u8>> {
        validate_document_id(document_id)?;
        match fs::read(self.document_path(document_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RagError::NotFound(document_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the uploaded file. Succeeds when absent.
    #[inline]
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        validate_document_id(document_id)?;
        match fs::remove_file(self.document_path(document_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every uploaded document currently on disk.
    #[inline]
    pub async fn ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(document_id) = name.strip_suffix(".pdf") {
                ids.push(document_id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{document_id}.pdf"))
    }
}

/// Lifecycle of one document through the ingestion pipeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Indexing,
    Indexed { chunks: usize },
    Failed { error: String },
}

/// In-process registry of document statuses, seeded from the two on-disk
/// roots at startup. `Indexing` and `Failed` are per-process transients; a
/// restart mid-index degrades back to `Uploaded`.
#[derive(Default)]
pub struct StatusRegistry {
    statuses: RwLock<HashMap<String, DocumentStatus>>,
}

impl StatusRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild statuses from what the uploads root and vector store hold.
    #[inline]
    pub async fn seed(intake: &DocumentIntake, store: &VectorStore) -> Result<Self> {
        let mut statuses = HashMap::new();
        for document_id in intake.ids().await? {
            statuses.insert(document_id, DocumentStatus::Uploaded);
        }
        for summary in store.documents().await? {
            statuses.insert(
                summary.document_id,
                DocumentStatus::Indexed {
                    chunks: summary.chunk_count,
                },
            );
        }

        debug!("Seeded status registry with {} documents", statuses.len());
        Ok(Self {
            statuses: RwLock::new(statuses),
        })
    }

    #[inline]
    pub async fn set(&self, document_id: &str, status: DocumentStatus) {
        let mut statuses = self.statuses.write().await;
        statuses.insert(document_id.to_string(), status);
    }

    #[inline]
    pub async fn get(&self, document_id: &str) -> Option<DocumentStatus> {
        let statuses = self.statuses.read().await;
        statuses.get(document_id).cloned()
    }

    #[inline]
    pub async fn remove(&self, document_id: &str) {
        let mut statuses = self.statuses.write().await;
        statuses.remove(document_id);
    }
}
