//! Ingestion processor
//!
//! Core logic of the indexing job: load, chunk, embed and upsert.

use crate::chunker::{chunk_pages, ChunkingConfig, TextChunk};
use crate::errors::IngestionError;
use crate::pdf::{load_document, DocumentPage};
use futures::{stream, StreamExt, TryStreamExt};
use ragchat_common::config::{AppConfig, IngestionConfig};
use ragchat_common::embeddings::create_embedder;
use ragchat_common::metrics;
use ragchat_common::vector::{create_vector_index, VectorRecord};
use ragchat_common::{Embedder, VectorIndex};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Summary of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub pages: usize,
    pub chunks: usize,
    pub upserted: usize,
}

/// Ingestion processor
pub struct IngestionProcessor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    upsert_batch_size: usize,
    max_concurrency: usize,
}

impl IngestionProcessor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking: ChunkingConfig::from(config),
            upsert_batch_size: config.upsert_batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Build the configured providers
    pub async fn from_config(config: &AppConfig) -> Result<Self, IngestionError> {
        let embedder = create_embedder(&config.embedding)?;
        let index = create_vector_index(&config.vector_index).await?;
        Ok(Self::new(embedder, index, &config.ingestion))
    }

    /// Index a document from disk
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<IngestionReport, IngestionError> {
        let pages = load_document(path)?;
        info!(page_count = pages.len(), "Document loaded");

        let id_prefix = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        self.index_pages(&path.display().to_string(), &id_prefix, &pages)
            .await
    }

    /// Chunk, embed and upsert already extracted pages.
    ///
    /// Record ids are `{id_prefix}-{chunk_index}`, so re-running the job over
    /// the same document overwrites its vectors instead of duplicating them.
    pub async fn index_pages(
        &self,
        source: &str,
        id_prefix: &str,
        pages: &[DocumentPage],
    ) -> Result<IngestionReport, IngestionError> {
        let chunks = chunk_pages(pages, &self.chunking)?;
        info!(chunk_count = chunks.len(), "Document split into chunks");

        let mut report = IngestionReport {
            pages: pages.len(),
            chunks: chunks.len(),
            upserted: 0,
        };
        if chunks.is_empty() {
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IngestionError::EmbeddingMismatch {
                expected: chunks.len(),
                got: embeddings.len(),
            });
        }
        info!(model = self.embedder.model_name(), "Chunks embedded");

        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, values)| to_record(source, id_prefix, chunk, values))
            .collect();

        report.upserted = self.upsert_all(records).await?;
        metrics::record_chunks_indexed(report.upserted, self.index.name());
        info!(
            upserted = report.upserted,
            index = self.index.name(),
            "Chunks indexed"
        );

        Ok(report)
    }

    /// Upsert in fixed-size batches with bounded parallelism
    async fn upsert_all(&self, records: Vec<VectorRecord>) -> Result<usize, IngestionError> {
        let mut batches = Vec::new();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            batches.push(records.by_ref().take(self.upsert_batch_size).collect::<Vec<_>>());
        }

        let index = &self.index;
        let written: Vec<usize> = stream::iter(batches)
            .map(|batch| async move { index.upsert(batch).await })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(written.into_iter().sum())
    }
}

fn to_record(source: &str, id_prefix: &str, chunk: TextChunk, values: Vec<f32>) -> VectorRecord {
    let id = format!("{}-{}", id_prefix, chunk.index);
    let mut record = VectorRecord::with_text(id, values, chunk.content);
    record.metadata.insert("source".to_string(), json!(source));
    record.metadata.insert("page".to_string(), json!(chunk.page));
    record.metadata.insert("chunk_index".to_string(), json!(chunk.index));
    record.metadata.insert(
        "loc".to_string(),
        json!({ "start": chunk.start_pos, "end": chunk.end_pos }),
    );
    record
}
