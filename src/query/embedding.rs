use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::chunk::{ChunkKind, CodeChunk};
use crate::storage::SqliteChunkStore;

/// A chunk ranked by similarity to a query vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarChunk {
    pub id: String,
    pub content: String,
    pub file_path: String,
    pub kind: ChunkKind,
    pub line_start: u32,
    pub line_end: u32,
    pub similarity: f32,
}

impl SimilarChunk {
    pub fn from_chunk(chunk: CodeChunk, similarity: f32) -> Self {
        Self {
            id: chunk.id,
            content: chunk.content,
            file_path: chunk.file_path,
            kind: chunk.kind,
            line_start: chunk.start_line,
            line_end: chunk.end_line,
            similarity,
        }
    }
}

/// Vector-similarity collaborator, consulted only when name resolution fails
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Embed free text into the same space as the stored chunks
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Nearest chunks to a vector, best first
    async fn search_similar(&self, vector: &[f32], top_k: usize, language: Option<&str>) -> Result<Vec<SimilarChunk>>;
}

/// Engine for generating text embeddings using local transformer models
pub struct EmbeddingEngine {
    model: Mutex<TextEmbedding>,
}

impl EmbeddingEngine {
    /// Create a new embedding engine with the default model
    pub fn new() -> Result<Self> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::CollaboratorUnavailable(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self { model: Mutex::new(model) })
    }

    fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self
            .model
            .lock()
            .map_err(|_| Error::CollaboratorUnavailable("embedding model lock poisoned".to_string()))?;
        model
            .embed(inputs, None)
            .map_err(|e| Error::CollaboratorUnavailable(format!("Embedding generation failed: {}", e)))
    }

    /// Generate embeddings for a batch of chunks
    pub fn embed_chunks(&self, chunks: &[CodeChunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }

        // name, kind and signature, plus the start of the body for context
        let inputs: Vec<String> = chunks.iter().map(|c| {
            let mut text = format!("{} {}\n", c.kind, c.name);
            if let Some(sig) = &c.signature {
                text.push_str(&format!("Signature: {}\n", sig));
            }
            if !c.content.is_empty() {
                let content_preview = c.content.chars().take(500).collect::<String>();
                text.push_str(&format!("Context: {}\n", content_preview));
            }
            text
        }).collect();

        self.embed(inputs)
    }

    /// Generate a single embedding for a query
    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(vec![query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::CollaboratorUnavailable("embedding model returned no vector".to_string()))
    }
}

/// [`SimilaritySearch`] over the chunk store's embedding table
pub struct EmbeddingSearch {
    engine: EmbeddingEngine,
    store: Arc<SqliteChunkStore>,
}

impl EmbeddingSearch {
    pub fn new(engine: EmbeddingEngine, store: Arc<SqliteChunkStore>) -> Self {
        Self { engine, store }
    }

    /// Embed and store a vector for every chunk in the store.
    /// Returns the number of chunks embedded.
    pub fn embed_store(&self, batch_size: usize) -> Result<usize> {
        let chunks = self.store.find_chunks(&crate::chunk::ChunkQuery::all())?;
        let mut processed = 0;

        for batch in chunks.chunks(batch_size.max(1)) {
            let vectors = self.engine.embed_chunks(batch)?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                self.store.insert_embedding(&chunk.id, &vector)?;
            }
            processed += batch.len();
            tracing::debug!("Embedded {}/{} chunks", processed, chunks.len());
        }

        Ok(processed)
    }
}

#[async_trait]
impl SimilaritySearch for EmbeddingSearch {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.engine.embed_query(text)
    }

    async fn search_similar(&self, vector: &[f32], top_k: usize, language: Option<&str>) -> Result<Vec<SimilarChunk>> {
        let hits = self
            .store
            .search_by_vector(vector, top_k, language)
            .map_err(|e| Error::CollaboratorUnavailable(format!("vector search failed: {}", e)))?;

        Ok(hits
            .into_iter()
            .map(|(chunk, score)| SimilarChunk::from_chunk(chunk, score))
            .collect())
    }
}
