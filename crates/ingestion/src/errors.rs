//! Ingestion job error types

use ragchat_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("No text content extracted from {0}")]
    EmptyDocument(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedFormat(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("Embedding returned {got} vectors for {expected} chunks")]
    EmbeddingMismatch { expected: usize, got: usize },

    #[error("Provider error: {0}")]
    Provider(#[from] AppError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
