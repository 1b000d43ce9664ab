//! Retriever - Embeds a query and searches the vector index

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::metrics;
use crate::vector::VectorIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A text-bearing retrieval hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Index record id
    pub id: String,

    /// Chunk text from the index metadata
    pub text: String,

    /// Similarity score reported by the index
    pub score: f32,
}

/// Top-k semantic retrieval over the indexed document
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve chunks for `query`, most similar first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, self.top_k, true).await?;
        let returned = matches.len();

        let chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .take(self.top_k)
            .filter_map(|m| {
                let Some(text) = m.text().map(str::to_string) else {
                    tracing::warn!(id = %m.id, index = self.index.name(), "Match without text metadata skipped");
                    return None;
                };
                Some(RetrievedChunk {
                    id: m.id,
                    text,
                    score: m.score,
                })
            })
            .collect();

        tracing::debug!(
            query = %query,
            returned,
            kept = chunks.len(),
            top_score = chunks.first().map(|c| c.score),
            "Retrieval completed"
        );
        metrics::record_retrieval(chunks.len());

        Ok(chunks)
    }
}
