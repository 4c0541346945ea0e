//! Method Resolver
//!
//! Turns a method name (plus optional class and file hints) into a concrete
//! [`MethodNode`]. Resolution is an ordered pipeline; the first resolver to
//! produce a match wins:
//! 1. Exact name match in the Method Index
//! 2. Case-insensitive name match
//! 3. Semantic fallback through the vector-similarity collaborator
//!
//! Class hints compare hyphen-, underscore- and case-insensitively; file
//! hints accept either the full path or a trailing part of it.

use std::sync::Arc;
use async_trait::async_trait;
use crate::Result;
use crate::chunk::ChunkKind;
use crate::index::CodeIndex;
use crate::model::{normalize_name, MethodNode, UNKNOWN_CLASS};
use super::embedding::{SimilarChunk, SimilaritySearch};

/// What to resolve
#[derive(Debug, Clone, Copy)]
pub struct MethodQuery<'a> {
    pub name: &'a str,
    pub class_name: Option<&'a str>,
    pub file_path: Option<&'a str>,
}

impl<'a> MethodQuery<'a> {
    pub fn named(name: &'a str) -> Self {
        Self { name, class_name: None, file_path: None }
    }

    pub fn in_class(mut self, class_name: Option<&'a str>) -> Self {
        self.class_name = class_name;
        self
    }

    pub fn in_file(mut self, file_path: Option<&'a str>) -> Self {
        self.file_path = file_path;
        self
    }

    /// Whether an indexed method satisfies the class and file hints
    pub fn accepts(&self, method: &MethodNode) -> bool {
        self.accepts_class(&method.class_name) && self.accepts_file(&method.file_path)
    }

    fn accepts_class(&self, class_name: &str) -> bool {
        self.class_name
            .is_none_or(|wanted| normalize_name(wanted) == normalize_name(class_name))
    }

    fn accepts_file(&self, file_path: &str) -> bool {
        self.file_path
            .is_none_or(|wanted| file_path == wanted || file_path.ends_with(wanted))
    }

    /// Text sent to the embedding model
    pub fn search_text(&self) -> String {
        match self.class_name {
            Some(class) => format!("method {} in class {}", self.name, class),
            None => format!("method {}", self.name),
        }
    }
}

/// Strategy that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    ExactName,
    CaseInsensitive,
    Semantic,
}

impl ResolutionStrategy {
    /// Get the confidence score for this strategy
    pub fn confidence(&self) -> f32 {
        match self {
            Self::ExactName => 1.0,
            Self::CaseInsensitive => 0.9,
            Self::Semantic => 0.7,
        }
    }
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub method: MethodNode,
    pub strategy: ResolutionStrategy,
}

/// One stage of the pipeline
#[async_trait]
pub trait MethodResolver: Send + Sync {
    fn strategy(&self) -> ResolutionStrategy;

    async fn resolve(&self, query: &MethodQuery<'_>, index: &CodeIndex) -> Result<Option<MethodNode>>;
}

/// Exact name lookup in the Method Index
pub struct ExactNameResolver;

#[async_trait]
impl MethodResolver for ExactNameResolver {
    fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::ExactName
    }

    async fn resolve(&self, query: &MethodQuery<'_>, index: &CodeIndex) -> Result<Option<MethodNode>> {
        Ok(index
            .method(query.name)
            .filter(|m| query.accepts(m))
            .cloned())
    }
}

/// Case-insensitive scan of the Method Index
pub struct CaseInsensitiveResolver;

#[async_trait]
impl MethodResolver for CaseInsensitiveResolver {
    fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::CaseInsensitive
    }

    async fn resolve(&self, query: &MethodQuery<'_>, index: &CodeIndex) -> Result<Option<MethodNode>> {
        Ok(index
            .methods()
            .values()
            .find(|m| m.name.eq_ignore_ascii_case(query.name) && query.accepts(m))
            .cloned())
    }
}

/// Nearest-neighbour lookup through the vector-similarity collaborator.
///
/// The first callable hit whose content mentions the method name is taken.
/// It maps to the indexed method with the same id when there is one;
/// otherwise a node is synthesized from the hit, which is only acceptable
/// when no class hint was given.
pub struct SemanticResolver {
    similarity: Arc<dyn SimilaritySearch>,
    top_k: usize,
}

impl SemanticResolver {
    pub fn new(similarity: Arc<dyn SimilaritySearch>, top_k: usize) -> Self {
        Self { similarity, top_k }
    }

    fn node_for_hit(&self, query: &MethodQuery<'_>, hit: &SimilarChunk, index: &CodeIndex) -> Option<MethodNode> {
        let is_callable = matches!(hit.kind, ChunkKind::Method | ChunkKind::Function);
        if !is_callable || !hit.content.contains(query.name) || !query.accepts_file(&hit.file_path) {
            return None;
        }

        let id = crate::model::node_id(&hit.file_path, query.name);
        match index.method_by_id(&id) {
            Some(indexed) => query.accepts_class(&indexed.class_name).then(|| indexed.clone()),
            None if query.class_name.is_none() => {
                let mut node = MethodNode::new(&hit.file_path, UNKNOWN_CLASS, query.name, hit.line_start, hit.line_end);
                node.signature = hit.content.lines().next().unwrap_or_default().trim().to_string();
                Some(node)
            }
            None => None,
        }
    }
}

#[async_trait]
impl MethodResolver for SemanticResolver {
    fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::Semantic
    }

    async fn resolve(&self, query: &MethodQuery<'_>, index: &CodeIndex) -> Result<Option<MethodNode>> {
        let vector = self.similarity.embed_text(&query.search_text()).await?;
        let hits = self.similarity.search_similar(&vector, self.top_k, None).await?;

        Ok(hits.iter().find_map(|hit| self.node_for_hit(query, hit, index)))
    }
}

/// Ordered list of resolvers
pub struct ResolverPipeline {
    resolvers: Vec<Box<dyn MethodResolver>>,
}

impl ResolverPipeline {
    /// Exact and case-insensitive resolution, plus the semantic fallback
    /// when a collaborator is available
    pub fn new(similarity: Option<Arc<dyn SimilaritySearch>>, top_k: usize) -> Self {
        let mut resolvers: Vec<Box<dyn MethodResolver>> =
            vec![Box::new(ExactNameResolver), Box::new(CaseInsensitiveResolver)];
        if let Some(similarity) = similarity {
            resolvers.push(Box::new(SemanticResolver::new(similarity, top_k)));
        }
        Self { resolvers }
    }

    pub fn with_resolvers(resolvers: Vec<Box<dyn MethodResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn strategies(&self) -> Vec<ResolutionStrategy> {
        self.resolvers.iter().map(|r| r.strategy()).collect()
    }

    /// Try each resolver in order. A resolver error stops the pipeline.
    pub async fn resolve(&self, query: &MethodQuery<'_>, index: &CodeIndex) -> Result<Option<Resolution>> {
        for resolver in &self.resolvers {
            if let Some(method) = resolver.resolve(query, index).await? {
                return Ok(Some(Resolution { method, strategy: resolver.strategy() }));
            }
        }
        Ok(None)
    }
}
