//! Structural analyses over a built [`CodeIndex`](crate::index::CodeIndex)

pub mod call_graph;
pub mod dependency;
pub mod implementations;
pub mod inheritance;

pub use call_graph::{CallDirection, CallGraphMetadata, CallGraphTracer, MethodCallGraph, TraceOptions};
pub use dependency::{
    DependencyAnalyzer, DependencyGraph, DependencyMetrics, DependencyNode, DependencyOptions,
    DependencyScope, Hotspot, HotspotKind, HotspotThresholds,
};
pub use implementations::{find_implementations, Implementation, ImplementationOptions};
pub use inheritance::{build_inheritance_tree, InheritanceOptions, InheritanceTree};
