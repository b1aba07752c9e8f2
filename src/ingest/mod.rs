#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::database::VectorIndex;
use crate::llm::LlmClient;
use crate::segmenter::segment_document;
use crate::{DiagError, Result};

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub empty_documents: usize,
    pub chunks_stored: usize,
}

/// Ingest every `.txt` manual in `dir`: segment, embed and upsert chunk by
/// chunk. One file's failure is logged and skipped; it never aborts the run.
#[inline]
pub async fn ingest_directory(
    dir: &Path,
    llm: &dyn LlmClient,
    index: &dyn VectorIndex,
    max_chunk_len: usize,
) -> Result<IngestStats> {
    if !dir.is_dir() {
        return Err(DiagError::SourceNotFound(dir.display().to_string()));
    }

    index
        .ensure_collection()
        .await
        .map_err(|e| DiagError::Database(format!("Failed to prepare vector index: {}", e)))?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    files.sort();

    info!("Ingesting {} documents from {}", files.len(), dir.display());

    let progress = ProgressBar::new(files.len() as u64).with_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut stats = IngestStats::default();

    for file in files {
        let name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        progress.set_message(name);

        match ingest_file(&file, llm, index, max_chunk_len).await {
            Ok(0) => {
                stats.files_processed += 1;
                stats.empty_documents += 1;
            }
            Ok(count) => {
                stats.files_processed += 1;
                stats.chunks_stored += count;
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                stats.files_failed += 1;
            }
        }

        progress.inc(1);
    }

    progress.finish_and_clear();

    info!(
        "Ingestion finished: {} files, {} chunks stored, {} empty, {} failed",
        stats.files_processed, stats.chunks_stored, stats.empty_documents, stats.files_failed
    );

    Ok(stats)
}

/// Ingest a single document. Returns the number of chunks stored; zero means
/// the document was blank.
#[inline]
pub async fn ingest_file(
    path: &Path,
    llm: &dyn LlmClient,
    index: &dyn VectorIndex,
    max_chunk_len: usize,
) -> Result<usize> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DiagError::SourceNotFound(format!("{}: {}", path.display(), e)))?;

    let source_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown");

    let mut chunks = segment_document(&text, source_name, max_chunk_len);
    if chunks.is_empty() {
        debug!("Document '{}' is blank, nothing to ingest", source_name);
        return Ok(0);
    }

    for chunk in &mut chunks {
        let embedding = llm.embed(&chunk.content).map_err(|e| {
            DiagError::Backend(format!("Embedding failed for chunk {}: {}", chunk.id, e))
        })?;
        chunk.embedding = Some(embedding);

        index.upsert(chunk).await.map_err(|e| {
            DiagError::Database(format!("Failed to store chunk {}: {}", chunk.id, e))
        })?;
    }

    debug!("Ingested {} chunks from '{}'", chunks.len(), source_name);
    Ok(chunks.len())
}
