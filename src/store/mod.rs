
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{RagError, Result};

/// How many record files `all_chunks` reads concurrently.
const SNAPSHOT_READ_CONCURRENCY: usize = 8;

/// The persisted unit: one self-describing record per document holding its
/// full ordered chunk list. Replaced as a whole on re-index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub document_id: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub written_at: DateTime<Utc>,
}

/// One stored chunk, as yielded by [`VectorStore::all_chunks`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredChunk {
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Per-document summary used by listing surfaces.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentSummary {
    pub document_id: String,
    pub chunk_count: usize,
    pub written_at: DateTime<Utc>,
}

/// File-backed vector store: one JSON record per document under `root`,
/// replaced atomically via write-to-temp-then-rename.
///
/// Writes are serialized per document id; writes to different documents and
/// reads during writes to other documents proceed concurrently. A reader
/// racing a same-document replace observes the fully-old or fully-new
/// record, never a mix.
pub struct VectorStore {
    root: PathBuf,
    /// Vector dimension per stored document (only documents that carry at
    /// least one vector). The store-wide dimension is established by any
    /// entry and resets when the map empties.
    dimensions: RwLock<HashMap<String, usize>>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorStore {
    /// Open the store rooted at `root`, creating the directory if needed and
    /// seeding dimension bookkeeping from the records already on disk.
    #[inline]
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let mut dimensions = HashMap::new();
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            // Leftover temp files mean a crash mid-replace; the committed
            // record (if any) is intact, so the temp is garbage.
            if name.contains(".json.tmp-") {
                warn!("Removing orphaned temp file {}", path.display());
                let _ = fs::remove_file(&path).await;
                continue;
            }

            let Some(document_id) = name.strip_suffix(".json") else {
                continue;
            };

            match load_record(&path, document_id).await {
                Ok(record) => {
                    if let Some(first) = record.embeddings.first() {
                        dimensions.insert(record.document_id, first.len());
                    }
                }
                Err(e) => {
                    // Surfaced as CorruptRecord when the document is read;
                    // opening the store stays possible.
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }

        info!(
            "Vector store opened at {} ({} dimensioned documents)",
            root.display(),
            dimensions.len()
        );

        Ok(Self {
            root,
            dimensions: RwLock::new(dimensions),
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the record for `document_id` with the given (text, vector)
    /// pairs as a single atomic unit.
    ///
    /// Fails with `DimensionMismatch` when any vector's length differs from
    /// the store's established dimension; the first put carrying vectors
    /// establishes it. A failed put leaves any prior record untouched.
    #[inline]
    pub async fn put(&self, document_id: &str, chunks: &[(String, Vec<f32>)]) -> Result<()> {
        validate_document_id(document_id)?;

        let vector_dimension = validate_uniform_dimension(chunks)?;

        let doc_lock = self.lock_for(document_id).await;
        let _write_guard = doc_lock.lock().await;

        // Fast pre-check before serializing anything to disk.
        if let Some(dim) = vector_dimension {
            let dimensions = self.dimensions.read().await;
            if let Some(&established) = established_dimension(&dimensions) {
                if dim != established {
                    return Err(RagError::DimensionMismatch {
                        expected: established,
                        actual: dim,
                    });
                }
            }
        }

        let record = DocumentRecord {
            document_id: document_id.to_string(),
            chunks: chunks.iter().map(|(text, _)| text.clone()).collect(),
            embeddings: chunks.iter().map(|(_, vector)| vector.clone()).collect(),
            written_at: Utc::now(),
        };

        let payload = serde_json::to_vec(&record)
            .map_err(|e| anyhow::anyhow!("Failed to serialize record: {e}"))?;

        // Temp file lives in the same directory so the rename cannot cross
        // filesystems.
        let final_path = self.record_path(document_id);
        let temp_path = self
            .root
            .join(format!("{document_id}.json.tmp-{}", Uuid::new_v4()));

        fs::write(&temp_path, &payload).await?;

        // Commit: re-check the established dimension (another document's
        // first put may have landed while we wrote the temp file), then
        // publish with an atomic rename.
        let mut dimensions = self.dimensions.write().await;
        if let Some(dim) = vector_dimension {
            if let Some(&established) = established_dimension(&dimensions) {
                if dim != established {
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(RagError::DimensionMismatch {
                        expected: established,
                        actual: dim,
                    });
                }
            }
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        match vector_dimension {
            Some(dim) => {
                dimensions.insert(document_id.to_string(), dim);
            }
            None => {
                // A record with no vectors does not hold a dimension.
                dimensions.remove(document_id);
            }
        }
        drop(dimensions);

        debug!(
            "Stored record for document {} ({} chunks)",
            document_id,
            chunks.len()
        );
        Ok(())
    }

    /// Fetch the record for `document_id`, or `NotFound`.
    #[inline]
    pub async fn get(&self, document_id: &str) -> Result<DocumentRecord> {
        validate_document_id(document_id)?;
        load_record(&self.record_path(document_id), document_id).await
    }

    /// Remove the record for `document_id`. Succeeds when absent.
    #[inline]
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        validate_document_id(document_id)?;

        let doc_lock = self.lock_for(document_id).await;
        let _write_guard = doc_lock.lock().await;

        let mut dimensions = self.dimensions.write().await;
        match fs::remove_file(self.record_path(document_id)).await {
            Ok(()) => {
                debug!("Deleted record for document {}", document_id);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        dimensions.remove(document_id);
        Ok(())
    }

    /// Snapshot of every stored chunk across all documents.
    ///
    /// Each record is observed fully-old or fully-new thanks to rename
    /// replacement; a put committing after this call starts is not required
    /// to be visible.
    #[inline]
    pub async fn all_chunks(&self) -> Result<Vec<StoredChunk>> {
        let records = self.load_all_records().await?;

        let mut chunks = Vec::new();
        for record in records {
            for (sequence_index, (text, vector)) in record
                .chunks
                .into_iter()
                .zip(record.embeddings.into_iter())
                .enumerate()
            {
                chunks.push(StoredChunk {
                    document_id: record.document_id.clone(),
                    sequence_index,
                    text,
                    vector,
                });
            }
        }

        debug!("Snapshot holds {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Per-document summaries, ordered by document id.
    #[inline]
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let records = self.load_all_records().await?;
        Ok(records
            .into_iter()
            .map(|record| DocumentSummary {
                document_id: record.document_id,
                chunk_count: record.chunks.len(),
                written_at: record.written_at,
            })
            .collect())
    }

    /// The store's established vector dimension, if any record carries
    /// vectors.
    #[inline]
    pub async fn dimension(&self) -> Option<usize> {
        let dimensions = self.dimensions.read().await;
        established_dimension(&dimensions).copied()
    }

    async fn load_all_records(&self) -> Result<Vec<DocumentRecord>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.contains(".json.tmp-") {
                continue;
            }
            if let Some(document_id) = name.strip_suffix(".json") {
                let document_id = document_id.to_string();
                paths.push((path, document_id));
            }
        }
        paths.sort_by(|a, b| a.1.cmp(&b.1));

        stream::iter(paths)
            .map(|(path, document_id)| async move {
                match load_record(&path, &document_id).await {
                    Ok(record) => Ok(Some(record)),
                    // A record deleted between listing and reading is not an
                    // inconsistency; the snapshot simply excludes it.
                    Err(RagError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .buffered(SNAPSHOT_READ_CONCURRENCY)
            .try_filter_map(|record| async move { Ok(record) })
            .try_collect()
            .await
    }

    async fn lock_for(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(
            locks
                .entry(document_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn record_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{document_id}.json"))
    }
}

fn established_dimension(dimensions: &HashMap<String, usize>) -> Option<&usize> {
    dimensions.values().next()
}

/// Document ids become file names; restrict them so they cannot escape the
/// storage roots.
pub(crate) fn validate_document_id(document_id: &str) -> Result<()> {
    if document_id.is_empty()
        || !document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || document_id.starts_with('.')
    {
        return Err(RagError::InvalidConfig(format!(
            "invalid document id: {document_id:?}"
        )));
    }
    Ok(())
}

/// All vectors in one put must share a length; returns it, or `None` for a
/// chunkless record.
fn validate_uniform_dimension(chunks: &[(String, Vec<f32>)]) -> Result<Option<usize>> {
    let Some((_, first)) = chunks.first() else {
        return Ok(None);
    };
    let expected = first.len();
    for (_, vector) in chunks {
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(Some(expected))
}

async fn load_record(path: &Path, document_id: &str) -> Result<DocumentRecord> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RagError::NotFound(document_id.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let record: DocumentRecord =
        serde_json::from_slice(&bytes).map_err(|e| RagError::CorruptRecord {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })?;

    if record.document_id != document_id {
        return Err(RagError::CorruptRecord {
            document_id: document_id.to_string(),
            reason: format!("record claims document id {}", record.document_id),
        });
    }

    if record.chunks.len() != record.embeddings.len() {
        return Err(RagError::CorruptRecord {
            document_id: document_id.to_string(),
            reason: format!(
                "{} chunk texts but {} vectors",
                record.chunks.len(),
                record.embeddings.len()
            ),
        });
    }

    if let Some(first) = record.embeddings.first() {
        let expected = first.len();
        if record.embeddings.iter().any(|v| v.len() != expected) {
            return Err(RagError::CorruptRecord {
                document_id: document_id.to_string(),
                reason: "vectors of unequal length".to_string(),
            });
        }
    }

    Ok(record)
}
