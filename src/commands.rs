use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::info;

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::ingest::ingest_directory;
use crate::llm::build_client;
use crate::pipeline::DiagnosisPipeline;
use crate::request::DiagnosisRequest;
use crate::{DiagError, Result};

/// Index a directory of plain-text workshop manuals
#[inline]
pub async fn ingest(dir: PathBuf) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let llm = build_client(&config.llm).context("Failed to build LLM client")?;
    let store = open_store(&config).await?;

    info!("Starting ingestion from {}", dir.display());
    let stats =
        ingest_directory(&dir, llm.as_ref(), &store, config.segmenter.max_chunk_len).await?;

    println!(
        "Ingested {} files: {} chunks stored, {} empty documents",
        stats.files_processed, stats.chunks_stored, stats.empty_documents
    );
    if stats.files_failed > 0 {
        println!(
            "{} {} file(s) could not be read, see the log for details",
            style("warning:").yellow().bold(),
            stats.files_failed
        );
    }

    Ok(())
}

/// Validate the request and run the diagnosis pipeline
#[inline]
pub async fn diagnose(symptom: String, vehicle_info: String) -> Result<()> {
    let request = DiagnosisRequest::new(symptom, vehicle_info);
    request.validate()?;

    let config = Config::load().context("Failed to load configuration")?;
    let llm = build_client(&config.llm).context("Failed to build LLM client")?;
    let store = open_store(&config).await?;

    let pipeline = DiagnosisPipeline::new(llm, Arc::new(store));
    let result = pipeline.diagnose(&request).await?;

    println!("{}", style("Teşhis").bold().underlined());
    println!();
    println!("{}", result.diagnosis);

    if !result.related_sources.is_empty() {
        println!();
        println!("{}", style("Kaynaklar").bold());
        for source in &result.related_sources {
            println!("  - {}", source);
        }
    }

    Ok(())
}

/// Show configuration and index summary
#[inline]
pub async fn status() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let store = open_store(&config).await?;
    let count = store
        .count_chunks()
        .await
        .map_err(|e| DiagError::Database(e.to_string()))?;

    println!("Provider: {:?}", config.llm.provider);
    println!("Embedding model: {}", config.llm.embedding_model);
    println!("Generation model: {}", config.llm.generation_model);
    println!("Vector store: {}", config.vector_database_path().display());
    println!("Indexed chunks: {}", count);

    Ok(())
}

/// Print the active configuration and where it is loaded from
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let content =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!("Configuration file: {}", config.config_file_path().display());
    println!();
    print!("{}", content);

    Ok(())
}

async fn open_store(config: &Config) -> Result<VectorStore> {
    VectorStore::open(
        &config.vector_database_path(),
        config.llm.embedding_dimension,
    )
    .await
    .map_err(|e| DiagError::Database(e.to_string()))
}
