pub mod engine;
pub mod embedding;
pub mod resolver;

pub use engine::CrossReferenceAnalyzer;
pub use embedding::{EmbeddingEngine, EmbeddingSearch, SimilarChunk, SimilaritySearch};
pub use resolver::{MethodQuery, MethodResolver, Resolution, ResolutionStrategy, ResolverPipeline};
