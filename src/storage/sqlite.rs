//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use crate::{Error, Result};
use crate::chunk::{ChunkKind, ChunkQuery, CodeChunk};
use super::{ChunkStore, schema};

/// SQLite-backed Code Entity Store.
///
/// The connection sits behind a mutex so the store can be shared across
/// tasks; no lock is ever held across an await point.
pub struct SqliteChunkStore {
    conn: Mutex<Connection>,
    storage_path: PathBuf,
}

impl SqliteChunkStore {
    /// Open a database file (creates if doesn't exist)
    ///
    /// Index snapshots go next to the database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage_path = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let store = Self { conn: Mutex::new(conn), storage_path };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            storage_path: std::env::temp_dir().join("codexref"),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Override where index snapshots are written
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::IndexUnavailable("chunk store connection lock poisoned".to_string()))
    }

    // ========== Chunk Operations ==========

    /// Insert or replace a chunk
    pub fn insert_chunk(&self, chunk: &CodeChunk) -> Result<()> {
        let conn = self.conn()?;
        Self::insert_chunk_with(&conn, chunk)
    }

    /// Insert many chunks in one transaction
    pub fn insert_chunks(&self, chunks: &[CodeChunk]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for chunk in chunks {
            Self::insert_chunk_with(&tx, chunk)?;
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    fn insert_chunk_with(conn: &Connection, chunk: &CodeChunk) -> Result<()> {
        let dependencies = serde_json::to_string(&chunk.dependencies)?;
        let metadata = chunk
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO chunks (id, kind, name, content, file_path, language, start_line, end_line,
                                           start_column, end_column, signature, documentation, dependencies, metadata, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                chunk.id,
                chunk.kind.as_str(),
                chunk.name,
                chunk.content,
                chunk.file_path,
                chunk.language,
                chunk.start_line,
                chunk.end_line,
                chunk.start_column,
                chunk.end_column,
                chunk.signature,
                chunk.documentation,
                dependencies,
                metadata,
                chunk.timestamp,
            ],
        )?;
        Ok(())
    }

    /// Get a chunk by id
    pub fn get_chunk(&self, id: &str) -> Result<Option<CodeChunk>> {
        let conn = self.conn()?;
        Self::get_chunk_with(&conn, id)
    }

    fn get_chunk_with(conn: &Connection, id: &str) -> Result<Option<CodeChunk>> {
        conn.query_row(
            &format!("SELECT {} FROM chunks WHERE id = ?1", schema::CHUNK_COLUMNS),
            [id],
            Self::row_to_chunk,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Find chunks matching a query
    ///
    /// Set fields are ANDed together; `content` is a substring match.
    pub fn find_chunks(&self, query: &ChunkQuery) -> Result<Vec<CodeChunk>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        let mut bind = |clause: &str, value: String, values: &mut Vec<String>| {
            values.push(value);
            clauses.push(format!("{} ?{}", clause, values.len()));
        };

        if let Some(path) = &query.file_path {
            bind("file_path =", path.clone(), &mut values);
        }
        if let Some(language) = &query.language {
            bind("language =", language.clone(), &mut values);
        }
        if let Some(kind) = query.kind {
            bind("kind =", kind.as_str().to_string(), &mut values);
        }
        if let Some(name) = &query.name {
            bind("name =", name.clone(), &mut values);
        }
        if let Some(content) = &query.content {
            bind("content LIKE", format!("%{}%", content), &mut values);
        }

        let mut sql = format!("SELECT {} FROM chunks", schema::CHUNK_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY file_path, start_line, id");
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let chunks = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_chunk)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    /// Find all chunks in a file, in line order
    pub fn find_chunks_in_file(&self, path: &str) -> Result<Vec<CodeChunk>> {
        self.find_chunks(&ChunkQuery::for_file(path))
    }

    /// Distinct file paths present in the store
    pub fn file_paths(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT file_path FROM chunks ORDER BY file_path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }

    /// Count all chunks
    pub fn count_chunks(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Helper to convert a row to a CodeChunk
    fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<CodeChunk> {
        let kind_str: String = row.get(1)?;
        let kind: ChunkKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let deps_str: String = row.get(12)?;
        let dependencies: Vec<Value> = serde_json::from_str(&deps_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let metadata_str: Option<String> = row.get(13)?;
        let metadata = metadata_str
            .map(|s| serde_json::from_str::<Map<String, Value>>(&s))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(CodeChunk {
            id: row.get(0)?,
            kind,
            name: row.get(2)?,
            content: row.get(3)?,
            file_path: row.get(4)?,
            language: row.get(5)?,
            start_line: row.get(6)?,
            end_line: row.get(7)?,
            start_column: row.get(8)?,
            end_column: row.get(9)?,
            signature: row.get(10)?,
            documentation: row.get(11)?,
            dependencies: dependencies
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            metadata,
            timestamp: row.get(14)?,
        })
    }

    // ========== Embedding Operations ==========

    /// Store an embedding vector for a chunk
    pub fn insert_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        let blob: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (chunk_id, vector) VALUES (?1, ?2)",
            params![chunk_id, blob],
        )?;
        Ok(())
    }

    /// Get the embedding vector for a chunk
    pub fn get_embedding(&self, chunk_id: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE chunk_id = ?1",
                [chunk_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| decode_vector(&b)))
    }

    /// Count stored embeddings
    pub fn count_embeddings(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Rank embedded chunks by cosine similarity to a query vector
    pub fn search_by_vector(
        &self,
        query_vector: &[f32],
        limit: usize,
        language: Option<&str>,
    ) -> Result<Vec<(CodeChunk, f32)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT e.chunk_id, e.vector FROM embeddings e \
             JOIN chunks c ON c.id = e.chunk_id \
             WHERE ?1 IS NULL OR c.language = ?1",
        )?;

        let candidates = stmt.query_map([language], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, decode_vector(&blob)))
        })?;

        let mut scored_results = Vec::new();
        for (id, vector) in candidates.flatten() {
            let score = cosine_similarity(query_vector, &vector);
            scored_results.push((id, score));
        }

        // Sort by score descending
        scored_results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut final_results = Vec::new();
        for (id, score) in scored_results.into_iter().take(limit) {
            if let Some(chunk) = Self::get_chunk_with(&conn, &id)? {
                final_results.push((chunk, score));
            }
        }

        Ok(final_results)
    }

    // ========== Bulk Operations ==========

    /// Delete all data (for re-importing)
    pub fn clear_all(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM embeddings", [])?;
        conn.execute("DELETE FROM chunks", [])?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            chunks: self.count_chunks()?,
            files: self.file_paths()?.len(),
            embeddings: self.count_embeddings()?,
        })
    }
}

#[cfg(test)]
impl SqliteChunkStore {
    /// Give stored chunks a kind no reader accepts
    pub(crate) fn corrupt_kind(&self, name: &str) {
        self.conn()
            .unwrap()
            .execute("UPDATE chunks SET kind = 'gadget' WHERE name = ?1", [name])
            .unwrap();
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn search_chunks(&self, query: &ChunkQuery) -> Result<Vec<CodeChunk>> {
        self.find_chunks(query)
    }

    async fn get_chunks_by_file(&self, file_path: &str) -> Result<Vec<CodeChunk>> {
        self.find_chunks_in_file(file_path)
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        self.file_paths()
    }

    fn storage_path(&self) -> PathBuf {
        self.storage_path.clone()
    }
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Database statistics
#[derive(Debug, Clone, Default)]
pub struct DbStats {
    pub chunks: usize,
    pub files: usize,
    pub embeddings: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Chunks: {}", self.chunks)?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(f, "  Embeddings: {}", self.embeddings)
    }
}
