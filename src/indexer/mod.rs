// Ingestion orchestrator
// Composes extract -> chunk -> embed -> store for one document, tracking the
// document's lifecycle state along the way


use std::sync::Arc;

use tracing::{info, warn};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::documents::{DocumentIntake, DocumentStatus, StatusRegistry, TextExtractor};
use crate::embeddings::Embedder;
use crate::store::VectorStore;
use crate::{RagError, Result};

/// Runs the ingestion pipeline for single documents.
///
/// The vector store is only touched once chunking and embedding have both
/// fully succeeded, so a failed run never leaves partial state behind and a
/// prior indexed record stays intact.
pub struct Indexer {
    intake: Arc<DocumentIntake>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    chunking: ChunkingConfig,
    statuses: Arc<StatusRegistry>,
}

impl Indexer {
    #[inline]
    pub fn new(
        intake: Arc<DocumentIntake>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        chunking: ChunkingConfig,
        statuses: Arc<StatusRegistry>,
    ) -> Self {
        Self {
            intake,
            extractor,
            embedder,
            store,
            chunking,
            statuses,
        }
    }

    /// Index (or re-index) one uploaded document. Returns the number of
    /// chunks written. Safe to call again after a failure.
    #[inline]
    pub async fn index_document(&self, document_id: &str) -> Result<usize> {
        // Missing upload is a caller error, not a failed indexing run.
        let bytes = self.intake.load(document_id).await?;

        self.statuses
            .set(document_id, DocumentStatus::Indexing)
            .await;

        match self.run_pipeline(document_id, &bytes).await {
            Ok(chunk_count) => {
                self.statuses
                    .set(
                        document_id,
                        DocumentStatus::Indexed {
                            chunks: chunk_count,
                        },
                    )
                    .await;
                info!("Indexed document {} ({} chunks)", document_id, chunk_count);
                Ok(chunk_count)
            }
            Err(e) => {
                warn!("Indexing failed for document {}: {}", document_id, e);
                self.statuses
                    .set(
                        document_id,
                        DocumentStatus::Failed {
                            error: e.to_string(),
                        },
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Remove a document from both roots and the status registry.
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.intake.delete(document_id).await?;
        self.store.delete(document_id).await?;
        self.statuses.remove(document_id).await;
        info!("Deleted document {}", document_id);
        Ok(())
    }

    async fn run_pipeline(&self, document_id: &str, bytes: &[u8]) -> Result<usize> {
        let text = self.extractor.extract_text(bytes)?;
        let chunks = chunk_text(&text, &self.chunking)?;
        let vectors = self.embedder.embed(&chunks).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingBackend(format!(
                "Backend returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let pairs: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        self.store.put(document_id, &pairs).await?;
        Ok(pairs.len())
    }
}
