// LanceDB-backed implementation of the vector index

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::{RetrievalCandidate, VectorIndex};
use crate::segmenter::{DocumentChunk, ERROR_CODES_KEY, TITLE_KEY};

const TABLE_NAME: &str = "fault_diagnosis";

/// Vector store for embedded manual chunks, using LanceDB for persistence
/// and similarity search
pub struct VectorStore {
    connection: Connection,
    embedding_dimension: usize,
}

impl VectorStore {
    /// Open (or create) the store under `data_dir`.
    ///
    /// The embedding dimension of an existing table wins over the configured
    /// one, so re-opening a store populated with a different model keeps
    /// working.
    #[inline]
    pub async fn open(data_dir: &Path, embedding_dimension: u32) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!(
                "Failed to create vector database directory: {}",
                data_dir.display()
            )
        })?;

        let uri = format!("file://{}", data_dir.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let mut store = Self {
            connection,
            embedding_dimension: embedding_dimension as usize,
        };

        if let Some(dimension) = store.existing_dimension().await? {
            debug!("Detected existing vector dimension: {}", dimension);
            store.embedding_dimension = dimension;
        }

        Ok(store)
    }

    /// Number of chunks currently stored
    #[inline]
    pub async fn count_chunks(&self) -> Result<usize> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;

        table.count_rows(None).await.context("Failed to count rows")
    }

    /// Read the vector column dimension from an existing table, if any
    async fn existing_dimension(&self) -> Result<Option<usize>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open existing table")?;

        let schema = table.schema().await.context("Failed to read table schema")?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(anyhow!(
            "Could not find vector column or determine dimension"
        ))
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.embedding_dimension as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("error_codes", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn chunk_batch(&self, chunk: &DocumentChunk, embedding: &[f32]) -> Result<RecordBatch> {
        let values_array = Float32Array::from(embedding.to_vec());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.embedding_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .context("Failed to create vector array")?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(vec![chunk.id.to_string()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![chunk.content.as_str()])),
            Arc::new(StringArray::from(vec![chunk.source_name.as_str()])),
            Arc::new(StringArray::from(vec![
                chunk.metadata.get(TITLE_KEY).map(String::as_str),
            ])),
            Arc::new(StringArray::from(vec![
                chunk.metadata.get(ERROR_CODES_KEY).map(String::as_str),
            ])),
            Arc::new(StringArray::from(vec![Utc::now().to_rfc3339()])),
        ];

        RecordBatch::try_new(self.schema(), arrays).context("Failed to create record batch")
    }

    fn parse_candidate_batch(batch: &RecordBatch) -> Result<Vec<RetrievalCandidate>> {
        let contents = batch
            .column_by_name("content")
            .and_then(|column| column.as_any().downcast_ref::<StringArray>())
            .context("Missing or invalid content column")?;

        let sources = batch
            .column_by_name("source")
            .and_then(|column| column.as_any().downcast_ref::<StringArray>())
            .context("Missing or invalid source column")?;

        let mut candidates = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            candidates.push(RetrievalCandidate {
                content: contents.value(row).to_string(),
                source_name: sources.value(row).to_string(),
            });
        }

        Ok(candidates)
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    #[inline]
    async fn ensure_collection(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        if table_names.contains(&TABLE_NAME.to_string()) {
            debug!("Table '{}' already exists", TABLE_NAME);
            return Ok(());
        }

        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .context("Failed to create table")?;

        info!(
            "Created table '{}' with {} dimensions",
            TABLE_NAME, self.embedding_dimension
        );
        Ok(())
    }

    #[inline]
    async fn upsert(&self, chunk: &DocumentChunk) -> Result<()> {
        let embedding = chunk
            .embedding
            .as_deref()
            .ok_or_else(|| anyhow!("Chunk {} has no embedding attached", chunk.id))?;

        if embedding.len() != self.embedding_dimension {
            return Err(anyhow!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.embedding_dimension,
                embedding.len()
            ));
        }

        let batch = self.chunk_batch(chunk, embedding)?;

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;

        // Replace any previous row with this id.
        table
            .delete(&format!("id = '{}'", chunk.id))
            .await
            .context("Failed to delete previous chunk version")?;

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .context("Failed to insert chunk")?;

        debug!("Upserted chunk {} from '{}'", chunk.id, chunk.source_name);
        Ok(())
    }

    #[inline]
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<RetrievalCandidate>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")?;

        let mut results = table
            .vector_search(vector)
            .context("Failed to create vector search")?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute search")?;

        let mut candidates = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .context("Failed to read result stream")?
        {
            candidates.extend(Self::parse_candidate_batch(&batch)?);
        }

        debug!("Search returned {} candidates", candidates.len());
        Ok(candidates)
    }
}
