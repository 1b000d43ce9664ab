//! Document loading
//!
//! Extracts per-page text from PDF files using lopdf. Plain text and
//! markdown files are read as a single page.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Text of one page, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    pub number: u32,
    pub text: String,
}

/// Load a document into pages, dispatching on the file extension
pub fn load_document(path: &Path) -> Result<Vec<DocumentPage>, IngestionError> {
    if !path.exists() {
        return Err(IngestionError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => extract_pages_from_pdf(path),
        Some("txt") | Some("md") => {
            let text = std::fs::read_to_string(path)?;
            let text = text.trim();
            if text.is_empty() {
                return Err(IngestionError::EmptyDocument(path.display().to_string()));
            }
            Ok(vec![DocumentPage {
                number: 1,
                text: text.to_string(),
            }])
        }
        _ => Err(IngestionError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Extract the text of every page that has any
pub fn extract_pages_from_pdf(path: &Path) -> Result<Vec<DocumentPage>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut extracted = Vec::with_capacity(pages.len());
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(raw) => {
                let text = clean_text(&raw);
                if !text.is_empty() {
                    extracted.push(DocumentPage {
                        number: *page_num,
                        text,
                    });
                }
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    if extracted.is_empty() {
        return Err(IngestionError::EmptyDocument(path.display().to_string()));
    }

    debug!(
        pages_with_text = extracted.len(),
        chars = extracted.iter().map(|p| p.text.len()).sum::<usize>(),
        "Text extraction complete"
    );

    Ok(extracted)
}

/// Collapse whitespace and normalise typographic quotes
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
