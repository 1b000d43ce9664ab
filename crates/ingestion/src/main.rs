//! RagChat Ingestion Job
//!
//! One-shot indexing of the source document:
//! 1. Loads the PDF (or a text file) page by page
//! 2. Splits pages into overlapping chunks
//! 3. Embeds the chunks in batches
//! 4. Upserts the vectors into the index
//!
//! The source path defaults to `ingestion.source_path` and can be given as
//! the first argument.

mod chunker;
mod errors;
mod pdf;
mod processor;

use processor::IngestionProcessor;
use ragchat_common::{config::AppConfig, VERSION};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting RagChat Ingestion Job v{}", VERSION);

    let source = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.ingestion.source_path));

    let processor = IngestionProcessor::from_config(&config).await?;
    info!(
        embedding_model = %config.embedding.model,
        index = %config.vector_index.provider,
        "Providers initialized"
    );

    let report = processor.process_file(&source).await.map_err(|e| {
        tracing::error!(path = %source.display(), error = %e, "Indexing failed");
        e
    })?;

    info!(
        pages = report.pages,
        chunks = report.chunks,
        upserted = report.upserted,
        "Document indexed successfully"
    );
    Ok(())
}
