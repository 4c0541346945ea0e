//! Storage Layer - the Code Entity Store
//!
//! The engine only depends on the [`ChunkStore`] contract. The bundled
//! implementation is SQLite with tables:
//! - chunks(id, kind, name, content, file_path, language, lines, columns, ...)
//! - embeddings(chunk_id, vector)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteChunkStore};

use crate::Result;
use crate::chunk::{ChunkQuery, CodeChunk};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Query contract of the Code Entity Store.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Chunks matching every set field of the query
    async fn search_chunks(&self, query: &ChunkQuery) -> Result<Vec<CodeChunk>>;

    /// All chunks of one file, in line order
    async fn get_chunks_by_file(&self, file_path: &str) -> Result<Vec<CodeChunk>>;

    /// Distinct file paths, sorted
    async fn list_files(&self) -> Result<Vec<String>> {
        let chunks = self.search_chunks(&ChunkQuery::all()).await?;
        let paths: BTreeSet<String> = chunks.into_iter().map(|c| c.file_path).collect();
        Ok(paths.into_iter().collect())
    }

    /// Directory where derived artifacts (index snapshots) are written
    fn storage_path(&self) -> PathBuf;
}
