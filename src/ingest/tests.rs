use super::*;
use crate::database::RetrievalCandidate;
use crate::segmenter::DocumentChunk;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;

struct FixedEmbedder;

impl LlmClient for FixedEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }

    fn complete(&self, _prompt: &str, _system_prompt: Option<&str>) -> anyhow::Result<String> {
        Err(anyhow!("completion is not used during ingestion"))
    }
}

struct FailingEmbedder;

impl LlmClient for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow!("embedding backend down"))
    }

    fn complete(&self, _prompt: &str, _system_prompt: Option<&str>) -> anyhow::Result<String> {
        Err(anyhow!("completion is not used during ingestion"))
    }
}

/// Index double that records every upserted chunk
#[derive(Default)]
struct RecordingIndex {
    chunks: Mutex<Vec<DocumentChunk>>,
}

impl RecordingIndex {
    fn chunks(&self) -> Vec<DocumentChunk> {
        self.chunks.lock().expect("lock").clone()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn ensure_collection(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunk: &DocumentChunk) -> anyhow::Result<()> {
        self.chunks.lock().expect("lock").push(chunk.clone());
        Ok(())
    }

    async fn search(
        &self,
        _vector: &[f32],
        _limit: usize,
    ) -> anyhow::Result<Vec<RetrievalCandidate>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn directory_ingestion_stores_embedded_chunks() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("cooling.txt"),
        "Check coolant level when the engine is cold.",
    )
    .expect("write succeeds");
    std::fs::write(dir.path().join("blank.txt"), "   \n\n  ").expect("write succeeds");
    std::fs::write(dir.path().join("notes.md"), "ignored, not a txt file").expect("write succeeds");

    let index = RecordingIndex::default();
    let stats = ingest_directory(dir.path(), &FixedEmbedder, &index, 1000)
        .await
        .expect("ingestion succeeds");

    assert_eq!(stats.files_processed, 2);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.empty_documents, 1);
    assert_eq!(stats.chunks_stored, 1);

    let chunks = index.chunks();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source_name, "cooling.txt");
    assert_eq!(chunks[0].embedding, Some(vec![0.1, 0.2, 0.3, 0.4]));
}

#[tokio::test]
async fn unreadable_file_does_not_abort_the_run() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("good.txt"), "Inspect hoses for cracks.")
        .expect("write succeeds");
    // A directory with a .txt name is picked up by the scan but cannot be
    // read as a document.
    std::fs::create_dir(dir.path().join("broken.txt")).expect("mkdir succeeds");

    let index = RecordingIndex::default();
    let stats = ingest_directory(dir.path(), &FixedEmbedder, &index, 1000)
        .await
        .expect("ingestion succeeds");

    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(index.chunks().len(), 1);
}

#[tokio::test]
async fn missing_file_is_source_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("missing.txt");

    let index = RecordingIndex::default();
    let result = ingest_file(&missing, &FixedEmbedder, &index, 1000).await;

    assert!(matches!(result, Err(DiagError::SourceNotFound(_))));
}

#[tokio::test]
async fn missing_directory_is_source_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("no-such-dir");

    let index = RecordingIndex::default();
    let result = ingest_directory(&missing, &FixedEmbedder, &index, 1000).await;

    assert!(matches!(result, Err(DiagError::SourceNotFound(_))));
}

#[tokio::test]
async fn embedding_failure_surfaces_as_backend_error() {
    let dir = TempDir::new().expect("temp dir");
    let file = dir.path().join("cooling.txt");
    std::fs::write(&file, "Check coolant level.").expect("write succeeds");

    let index = RecordingIndex::default();
    let result = ingest_file(&file, &FailingEmbedder, &index, 1000).await;

    assert!(matches!(result, Err(DiagError::Backend(_))));
    assert!(index.chunks().is_empty());
}

#[tokio::test]
async fn long_document_is_stored_in_bounded_chunks() {
    let dir = TempDir::new().expect("temp dir");
    let paragraphs: Vec<String> = (0..20)
        .map(|i| format!("Paragraph {} about the cooling circuit and its components.", i))
        .collect();
    let file = dir.path().join("manual.txt");
    std::fs::write(&file, paragraphs.join("\n\n")).expect("write succeeds");

    let index = RecordingIndex::default();
    let stored = ingest_file(&file, &FixedEmbedder, &index, 120)
        .await
        .expect("ingestion succeeds");

    assert!(stored > 1);
    for chunk in index.chunks() {
        assert!(chunk.content.chars().count() <= 120);
        assert!(chunk.embedding.is_some());
    }
}
