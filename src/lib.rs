//! # Codexref - Cross-reference analysis for parsed code
//!
//! Builds a Method Index and Class Index from the code chunks a parser has
//! stored, then answers structural questions about the codebase.
//!
//! Codexref provides:
//! - Call graph tracing with name and semantic method resolution
//! - Inheritance trees and interface implementation search
//! - Class dependency graphs with cycle detection, hotspots and package metrics
//! - SQLite-backed chunk storage with local embeddings for similarity search
//! - JSON snapshots of the built index

pub mod chunk;
pub mod model;
pub mod edge;
pub mod graph;
pub mod storage;
pub mod index;
pub mod query;
pub mod analysis;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use chunk::{ChunkKind, ChunkQuery, CodeChunk, Language};
pub use model::{ClassNode, ClassType, MethodNode};
pub use edge::{CallEdge, CallKind, DependencyEdge, DependencyKind};
pub use graph::DirectedGraph;
pub use storage::{ChunkStore, SqliteChunkStore};
pub use index::{CodeIndex, IndexBuilder, IndexStats};
pub use query::{CrossReferenceAnalyzer, SimilaritySearch};

/// Result type alias for Codexref operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Codexref operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
