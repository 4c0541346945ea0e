//! Call Graph Tracer
//!
//! Breadth-first expansion from a root method over `calls` (callees),
//! `calledBy` (callers) or both. Every name met along the way goes through
//! the [`ResolverPipeline`], so the graph can cross into methods that were
//! only found semantically.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::edge::{CallEdge, CallKind};
use crate::graph::DirectedGraph;
use crate::index::CodeIndex;
use crate::model::MethodNode;
use crate::query::resolver::{MethodQuery, ResolutionStrategy, ResolverPipeline};

/// Default bound on call-graph expansion
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Which way to walk from the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    #[default]
    Callees,
    Callers,
    Both,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Callees => "callees",
            CallDirection::Callers => "callers",
            CallDirection::Both => "both",
        }
    }

    fn follows_callees(&self) -> bool {
        matches!(self, CallDirection::Callees | CallDirection::Both)
    }

    fn follows_callers(&self) -> bool {
        matches!(self, CallDirection::Callers | CallDirection::Both)
    }
}

impl FromStr for CallDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "callees" | "down" | "out" => Ok(CallDirection::Callees),
            "callers" | "up" | "in" => Ok(CallDirection::Callers),
            "both" | "all" => Ok(CallDirection::Both),
            _ => Err(Error::Parse(format!("Unknown call direction: {}", s))),
        }
    }
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceOptions {
    pub method_name: String,
    pub class_name: Option<String>,
    pub file_path: Option<String>,
    pub max_depth: usize,
    pub direction: CallDirection,
}

impl TraceOptions {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            class_name: None,
            file_path: None,
            max_depth: DEFAULT_MAX_DEPTH,
            direction: CallDirection::default(),
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_direction(mut self, direction: CallDirection) -> Self {
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphMetadata {
    pub total_methods: usize,
    /// Highest complexity among the collected methods
    pub max_depth: u32,
    pub circular_dependencies: usize,
}

/// Result of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallGraph {
    pub root: MethodNode,
    /// Collected methods keyed by id
    pub nodes: BTreeMap<String, MethodNode>,
    pub edges: Vec<CallEdge>,
    pub cycles: Vec<Vec<String>>,
    /// Names of collected methods nobody calls
    pub entry_points: Vec<String>,
    /// Names of collected methods that call nothing
    pub termination_points: Vec<String>,
    pub metadata: CallGraphMetadata,
}

impl MethodCallGraph {
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.values().map(|m| m.name.as_str()).collect()
    }
}

fn call_kind(strategy: ResolutionStrategy) -> CallKind {
    match strategy {
        ResolutionStrategy::Semantic => CallKind::Semantic,
        ResolutionStrategy::ExactName | ResolutionStrategy::CaseInsensitive => CallKind::Direct,
    }
}

pub struct CallGraphTracer<'a> {
    index: &'a CodeIndex,
    resolver: &'a ResolverPipeline,
}

impl<'a> CallGraphTracer<'a> {
    pub fn new(index: &'a CodeIndex, resolver: &'a ResolverPipeline) -> Self {
        Self { index, resolver }
    }

    /// Trace the call graph around a method.
    ///
    /// Fails with [`Error::NotFound`] when the root cannot be resolved. A
    /// callee or caller that fails to resolve is logged and left out.
    pub async fn trace(&self, options: &TraceOptions) -> Result<MethodCallGraph> {
        let query = MethodQuery::named(&options.method_name)
            .in_class(options.class_name.as_deref())
            .in_file(options.file_path.as_deref());

        let root = self
            .resolver
            .resolve(&query, self.index)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Method not found: {}", options.method_name)))?
            .method;

        let mut nodes: BTreeMap<String, MethodNode> = BTreeMap::new();
        let mut edges: Vec<CallEdge> = Vec::new();
        let mut seen_edges: HashSet<(String, String)> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(MethodNode, usize)> = VecDeque::new();

        visited.insert(root.id.clone());
        queue.push_back((root.clone(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth < options.max_depth {
                if options.direction.follows_callees() {
                    for name in &current.calls {
                        let Some((callee, kind, weight)) = self.resolve_neighbour(name).await else {
                            continue;
                        };
                        let edge = CallEdge {
                            from: current.id.clone(),
                            to: callee.id.clone(),
                            kind,
                            weight,
                            file_path: current.file_path.clone(),
                            line: current.start_line,
                        };
                        push_edge(&mut edges, &mut seen_edges, edge);
                        if visited.insert(callee.id.clone()) {
                            queue.push_back((callee, depth + 1));
                        }
                    }
                }

                if options.direction.follows_callers() {
                    for name in &current.called_by {
                        let Some((caller, kind, weight)) = self.resolve_neighbour(name).await else {
                            continue;
                        };
                        let edge = CallEdge {
                            from: caller.id.clone(),
                            to: current.id.clone(),
                            kind,
                            weight,
                            file_path: caller.file_path.clone(),
                            line: caller.start_line,
                        };
                        push_edge(&mut edges, &mut seen_edges, edge);
                        if visited.insert(caller.id.clone()) {
                            queue.push_back((caller, depth + 1));
                        }
                    }
                }
            }

            nodes.insert(current.id.clone(), current);
        }

        let mut graph = DirectedGraph::new();
        for id in nodes.keys() {
            graph.add_node(id);
        }
        for edge in &edges {
            graph.add_edge(&edge.from, &edge.to);
        }
        let cycles = graph.find_cycles();

        let entry_points = nodes
            .values()
            .filter(|m| m.called_by.is_empty())
            .map(|m| m.name.clone())
            .collect();
        let termination_points = nodes
            .values()
            .filter(|m| m.calls.is_empty())
            .map(|m| m.name.clone())
            .collect();

        let metadata = CallGraphMetadata {
            total_methods: nodes.len(),
            max_depth: nodes.values().map(|m| m.complexity).max().unwrap_or(0),
            circular_dependencies: cycles.len(),
        };

        tracing::debug!(
            "Traced {} from {}: {} methods, {} edges",
            options.direction,
            root.name,
            metadata.total_methods,
            edges.len()
        );

        Ok(MethodCallGraph {
            root,
            nodes,
            edges,
            cycles,
            entry_points,
            termination_points,
            metadata,
        })
    }

    async fn resolve_neighbour(&self, name: &str) -> Option<(MethodNode, CallKind, f32)> {
        match self.resolver.resolve(&MethodQuery::named(name), self.index).await {
            Ok(Some(resolution)) => {
                let strategy = resolution.strategy;
                Some((resolution.method, call_kind(strategy), strategy.confidence()))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not resolve {}: {}", name, e);
                None
            }
        }
    }
}

fn push_edge(edges: &mut Vec<CallEdge>, seen: &mut HashSet<(String, String)>, edge: CallEdge) {
    if seen.insert((edge.from.clone(), edge.to.clone())) {
        edges.push(edge);
    }
}
