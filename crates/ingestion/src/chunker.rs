//! Text chunking module
//!
//! Splits page text into overlapping character chunks for embedding.

use crate::errors::IngestionError;
use crate::pdf::DocumentPage;
use ragchat_common::config::IngestionConfig;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// A text chunk with its position in the document
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// Index of this chunk in the document
    pub index: usize,
    /// Page the chunk was cut from
    pub page: u32,
    /// Start byte offset within the page text
    pub start_pos: usize,
    /// End byte offset within the page text
    pub end_pos: usize,
}

/// Split every page into chunks; chunks never span pages
pub fn chunk_pages(
    pages: &[DocumentPage],
    config: &ChunkingConfig,
) -> Result<Vec<TextChunk>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::ChunkingError(e.to_string()))?;
    let splitter = TextSplitter::new(chunk_config);

    let mut chunks = Vec::new();
    for page in pages {
        for (start_pos, text) in splitter.chunk_indices(&page.text) {
            chunks.push(TextChunk {
                content: text.to_string(),
                index: chunks.len(),
                page: page.number,
                start_pos,
                end_pos: start_pos + text.len(),
            });
        }
    }

    debug!(
        page_count = pages.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Text chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> DocumentPage {
        DocumentPage {
            number,
            text: text.to_string(),
        }
    }

    fn small() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 30,
        }
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "A stack is a last in first out structure. ".repeat(40);
        let chunks = chunk_pages(&[page(1, &text)], &small()).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
            assert_eq!(&text[chunk.start_pos..chunk.end_pos], chunk.content);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = "word ".repeat(400);
        let chunks = chunk_pages(&[page(1, &text)], &small()).unwrap();
        assert!(chunks.windows(2).any(|w| w[1].start_pos < w[0].end_pos));
    }

    #[test]
    fn test_indices_run_across_pages() {
        let pages = [
            page(1, &"Arrays store elements contiguously. ".repeat(10)),
            page(2, &"Linked lists chain nodes together. ".repeat(10)),
        ];
        let chunks = chunk_pages(&pages, &small()).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks.first().map(|c| c.page), Some(1));
        assert_eq!(chunks.last().map(|c| c.page), Some(2));
        assert!(!chunks.iter().any(|c| c.content.contains("Arrays") && c.content.contains("Linked")));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        let result = chunk_pages(&[page(1, "text")], &config);
        assert!(matches!(result, Err(IngestionError::ChunkingError(_))));
    }

    #[test]
    fn test_no_pages() {
        let chunks = chunk_pages(&[], &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }
}
