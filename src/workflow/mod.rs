// Workflow execution
// Retrieval-augmented query flow: embed the query, rank stored chunks, and
// assemble the retrieved context into a response


use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::retrieval::{Retriever, SearchHit};
use crate::store::VectorStore;
use crate::{RagError, Result};

/// Caller-supplied workflow description. Free-form beyond `name` and
/// `steps`; unknown fields are preserved so the API can echo the workflow
/// back verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl WorkflowSpec {
    #[inline]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Workflow")
    }
}

/// Executes workflows against the indexed corpus.
pub struct WorkflowEngine {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    top_k: usize,
}

impl WorkflowEngine {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            retriever: Retriever::new(store),
            top_k,
        }
    }

    /// Embed `query` and return the `top_k` most similar stored chunks.
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors.first().ok_or_else(|| {
            RagError::EmbeddingBackend("Backend returned no vector for the query".to_string())
        })?;

        self.retriever.search(query_vector, top_k).await
    }

    /// Run one workflow: retrieve context for `query` and synthesize the
    /// response text. An empty corpus yields an empty context block, not an
    /// error.
    #[inline]
    pub async fn execute(&self, workflow: &WorkflowSpec, query: &str) -> Result<String> {
        let hits = self.retrieve(query, self.top_k).await?;
        debug!(
            "Workflow '{}' retrieved {} chunks",
            workflow.display_name(),
            hits.len()
        );

        let context = hits.iter().map(|hit| hit.chunk.text.as_str()).join("\n");
        Ok(synthesize_response(workflow, query, &context, hits.len()))
    }
}

/// Assemble the response text from the retrieved context.
///
/// No LLM is involved; this is the seam where one would be called with the
/// query and context.
fn synthesize_response(
    workflow: &WorkflowSpec,
    query: &str,
    context: &str,
    retrieved: usize,
) -> String {
    format!(
        "Workflow '{}' executed successfully.\n\n\
         Query: {}\n\n\
         Retrieved Context:\n{}\n\n\
         Workflow Steps Executed: {}\n\n\
         Response: Assembled from {} retrieved chunks. Connect an LLM backend \
         to turn the retrieved context into a generated answer.",
        workflow.display_name(),
        query,
        context,
        workflow.steps.len(),
        retrieved
    )
}
