//! Cross-reference analyzer
//!
//! Owns the chunk store, the optional similarity collaborator and the index.
//! The index is built (or loaded from its snapshot) once, on first use, and
//! shared read-only by every query after that:
//! - Call graph tracing (callers/callees)
//! - Inheritance trees
//! - Dependency analysis (cycles, hotspots, metrics)
//! - Interface implementation search

use std::sync::Arc;
use tokio::sync::OnceCell;
use crate::Result;
use crate::analysis::{
    build_inheritance_tree, find_implementations, CallGraphTracer, DependencyAnalyzer,
    DependencyGraph, DependencyOptions, Implementation, ImplementationOptions, InheritanceOptions,
    InheritanceTree, MethodCallGraph, TraceOptions,
};
use crate::config::AnalyzerSettings;
use crate::index::{persistence, CodeIndex, IndexBuilder, IndexStats, SnapshotPaths};
use crate::storage::ChunkStore;
use super::embedding::SimilaritySearch;
use super::resolver::ResolverPipeline;

#[derive(Debug)]
struct BuiltIndex {
    index: Arc<CodeIndex>,
    stats: IndexStats,
}

/// Entry point for the four cross-reference queries
pub struct CrossReferenceAnalyzer {
    store: Arc<dyn ChunkStore>,
    resolver: ResolverPipeline,
    settings: AnalyzerSettings,
    built: OnceCell<BuiltIndex>,
}

impl CrossReferenceAnalyzer {
    /// Create an analyzer that resolves names from the index alone
    pub fn new(store: Arc<dyn ChunkStore>, settings: AnalyzerSettings) -> Self {
        Self {
            resolver: ResolverPipeline::new(None, settings.semantic_top_k),
            store,
            settings,
            built: OnceCell::new(),
        }
    }

    /// Enable the semantic fallback for method resolution
    pub fn with_similarity(mut self, similarity: Arc<dyn SimilaritySearch>) -> Self {
        self.resolver = ResolverPipeline::new(Some(similarity), self.settings.semantic_top_k);
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn snapshot_paths(&self) -> SnapshotPaths {
        self.settings.snapshot_paths(&self.store.storage_path())
    }

    /// Make the index available, loading the snapshot when one exists and
    /// building from the store otherwise. Only the first call does work.
    pub async fn build_indexes(&self) -> Result<Arc<CodeIndex>> {
        let built = self.built.get_or_try_init(|| self.load_or_build()).await?;
        Ok(built.index.clone())
    }

    /// Counters of the build (or load) that produced the current index
    pub async fn index_stats(&self) -> Result<IndexStats> {
        let built = self.built.get_or_try_init(|| self.load_or_build()).await?;
        Ok(built.stats)
    }

    /// Drop the in-memory index and its snapshot, then build again from the store
    pub async fn rebuild_indexes(&mut self) -> Result<IndexStats> {
        self.built.take();
        persistence::clear_indexes(&self.snapshot_paths()).await?;
        self.index_stats().await
    }

    /// Load the persisted snapshot, if both files are present and valid
    pub async fn load_indexes(&self) -> Option<CodeIndex> {
        persistence::load_indexes(&self.snapshot_paths()).await
    }

    /// Persist an index next to the store
    pub async fn save_indexes(&self, index: &CodeIndex) -> Result<()> {
        persistence::save_indexes(index, &self.snapshot_paths()).await
    }

    async fn load_or_build(&self) -> Result<BuiltIndex> {
        if let Some(index) = self.load_indexes().await {
            tracing::info!(
                "Loaded index snapshot ({} methods, {} classes)",
                index.method_count(),
                index.class_count()
            );
            let stats = IndexStats {
                classes: index.class_count(),
                methods: index.method_count(),
                loaded_from_snapshot: true,
                ..IndexStats::default()
            };
            return Ok(BuiltIndex { index: Arc::new(index), stats });
        }

        let (index, stats) = IndexBuilder::build_from_store(self.store.as_ref()).await?;
        if let Err(e) = self.save_indexes(&index).await {
            tracing::warn!("Failed to save index snapshot: {}", e);
        }

        Ok(BuiltIndex { index: Arc::new(index), stats })
    }

    /// Trace the call graph around a method
    pub async fn trace_method_calls(&self, options: &TraceOptions) -> Result<MethodCallGraph> {
        let index = self.build_indexes().await?;
        CallGraphTracer::new(&index, &self.resolver).trace(options).await
    }

    /// Subclass tree of a class
    pub async fn build_inheritance_tree(&self, options: &InheritanceOptions) -> Result<InheritanceTree> {
        let index = self.build_indexes().await?;
        build_inheritance_tree(&index, options)
    }

    /// Dependency graph around a class
    pub async fn analyze_dependencies(&self, options: &DependencyOptions) -> Result<DependencyGraph> {
        let index = self.build_indexes().await?;
        DependencyAnalyzer::new(&index, self.settings.hotspots).analyze(options)
    }

    /// Classes implementing an interface
    pub async fn find_implementations(&self, options: &ImplementationOptions) -> Result<Vec<Implementation>> {
        let index = self.build_indexes().await?;
        find_implementations(&index, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use serde_json::json;
    use crate::Error;
    use crate::analysis::{CallDirection, DependencyScope};
    use crate::chunk::{ChunkKind, CodeChunk};
    use crate::storage::SqliteChunkStore;

    fn seeded_store(dir: &Path) -> Arc<SqliteChunkStore> {
        let store = SqliteChunkStore::open_in_memory().unwrap().with_storage_path(dir);
        store
            .insert_chunks(&[
                CodeChunk::new("src/auth/AuthService.java", ChunkKind::Class, "AuthService", 1, 40, "class AuthService implements Service {}")
                    .with_metadata("interfaces", json!(["Service"])),
                CodeChunk::new("src/auth/AuthService.java", ChunkKind::Method, "login", 3, 12, "boolean login(String u) { return validateCredentials(u); }")
                    .with_dependencies(["validateCredentials"]),
                CodeChunk::new("src/auth/AuthService.java", ChunkKind::Method, "validateCredentials", 14, 20, "boolean validateCredentials(String u) { return true; }"),
                CodeChunk::new("src/auth/Service.java", ChunkKind::Interface, "Service", 1, 5, "interface Service {}"),
                CodeChunk::new("src/auth/Admin.java", ChunkKind::Class, "AdminService", 1, 10, "class AdminService extends AuthService {}")
                    .with_metadata("superclass", json!("AuthService")),
                CodeChunk::new("README.md", ChunkKind::Function, "ignored", 1, 2, "not code"),
            ])
            .unwrap();
        Arc::new(store)
    }

    fn analyzer(store: Arc<SqliteChunkStore>) -> CrossReferenceAnalyzer {
        CrossReferenceAnalyzer::new(store, AnalyzerSettings::default())
    }

    #[tokio::test]
    async fn test_trace_login() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(seeded_store(dir.path()));

        let graph = analyzer
            .trace_method_calls(&TraceOptions::new("login").with_depth(1).with_direction(CallDirection::Callees))
            .await
            .unwrap();

        assert_eq!(graph.root.class_name, "AuthService");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.entry_points, vec!["login"]);
        assert_eq!(graph.termination_points, vec!["validateCredentials"]);
    }

    #[tokio::test]
    async fn test_build_is_idempotent_and_snapshot_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        let first = analyzer(store.clone());
        let index = first.build_indexes().await.unwrap();
        let again = first.build_indexes().await.unwrap();
        assert!(Arc::ptr_eq(&index, &again));

        let stats = first.index_stats().await.unwrap();
        assert!(!stats.loaded_from_snapshot);
        assert_eq!(stats.files_skipped, 1);
        assert!(first.snapshot_paths().method_index.exists());

        let fresh = analyzer(store);
        let reloaded = fresh.build_indexes().await.unwrap();
        assert!(fresh.index_stats().await.unwrap().loaded_from_snapshot);
        assert_eq!(reloaded.method_count(), index.method_count());
        assert_eq!(reloaded.class_count(), index.class_count());
        assert_eq!(*reloaded, *index);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());
        analyzer(store.clone()).build_indexes().await.unwrap();

        let paths = SnapshotPaths::in_dir(dir.path());
        tokio::fs::write(&paths.class_index, b"{not json").await.unwrap();

        let fresh = analyzer(store);
        let index = fresh.build_indexes().await.unwrap();
        assert!(!fresh.index_stats().await.unwrap().loaded_from_snapshot);
        assert_eq!(index.class_count(), 3);
        // the rebuild rewrote a valid snapshot
        assert!(persistence::load_indexes(&paths).await.is_some());
    }

    #[tokio::test]
    async fn test_rebuild_indexes_ignores_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = analyzer(seeded_store(dir.path()));
        analyzer.build_indexes().await.unwrap();

        let stats = analyzer.rebuild_indexes().await.unwrap();
        assert!(!stats.loaded_from_snapshot);
        assert_eq!(stats.methods, 2);
    }

    #[tokio::test]
    async fn test_structural_queries() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(seeded_store(dir.path()));

        let tree = analyzer
            .build_inheritance_tree(&InheritanceOptions::new("AuthService"))
            .await
            .unwrap();
        assert_eq!(tree.depth, 1);
        assert_eq!(tree.concrete_classes, vec!["AdminService", "AuthService"]);

        let impls = analyzer
            .find_implementations(&ImplementationOptions::new("Service"))
            .await
            .unwrap();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].implementation_name, "AuthService");
        assert_eq!(impls[0].methods, vec!["login", "validateCredentials"]);

        let deps = analyzer
            .analyze_dependencies(&DependencyOptions::new("AuthService").with_scope(DependencyScope::Package))
            .await
            .unwrap();
        assert_eq!(deps.metrics.total_nodes, 3);
        assert_eq!(deps.metrics.total_edges, 2);
        let auth = deps.nodes.iter().find(|n| n.name == "AuthService").unwrap();
        assert_eq!(auth.dependents, vec!["src/auth/Admin.java:AdminService"]);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(seeded_store(dir.path()));

        let err = analyzer.trace_method_calls(&TraceOptions::new("logout")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = analyzer
            .find_implementations(&ImplementationOptions::new("AuthService"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
