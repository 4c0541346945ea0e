//! Dependency Graph Analyzer
//!
//! Builds a class-level dependency graph for a target at file, package or
//! global scope, then reports cycles, hotspots and package metrics.
//!
//! Edges are derived from what the Class Index and Method Index record:
//! superclass/interfaces, field types, cross-class calls and imports. An
//! edge may point at an indexed class outside the requested scope; only
//! in-scope classes become nodes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::edge::{DependencyEdge, DependencyKind};
use crate::graph::DirectedGraph;
use crate::index::CodeIndex;
use crate::model::{ClassNode, ClassType};

/// Which classes become nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    /// The target alone
    File,
    /// Every class sharing the target's package
    #[default]
    Package,
    /// Every indexed class
    Global,
}

impl DependencyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyScope::File => "file",
            DependencyScope::Package => "package",
            DependencyScope::Global => "global",
        }
    }
}

impl FromStr for DependencyScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(DependencyScope::File),
            "package" | "pkg" | "module" => Ok(DependencyScope::Package),
            "global" | "all" | "project" => Ok(DependencyScope::Global),
            _ => Err(Error::Parse(format!("Unknown dependency scope: {}", s))),
        }
    }
}

impl std::fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Limits above which a node is reported as a hotspot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotThresholds {
    pub max_methods: usize,
    pub max_coupling: usize,
    pub max_instability: f64,
    pub min_unstable_dependencies: usize,
}

impl Default for HotspotThresholds {
    fn default() -> Self {
        Self {
            max_methods: 10,
            max_coupling: 5,
            max_instability: 0.8,
            min_unstable_dependencies: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyOptions {
    pub target: String,
    /// Kinds of edge to produce; empty means all
    pub dependency_types: Vec<DependencyKind>,
    pub scope: DependencyScope,
}

impl DependencyOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            dependency_types: Vec::new(),
            scope: DependencyScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_types<I: IntoIterator<Item = DependencyKind>>(mut self, kinds: I) -> Self {
        self.dependency_types = kinds.into_iter().collect();
        self
    }

    fn wants(&self, kind: DependencyKind) -> bool {
        self.dependency_types.is_empty() || self.dependency_types.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    pub id: String,
    pub name: String,
    pub kind: ClassType,
    pub file_path: String,
    /// Ids this node depends on
    pub dependencies: Vec<String>,
    /// Ids depending on this node
    pub dependents: Vec<String>,
    /// Number of methods
    pub complexity: u32,
    /// Martin instability, Ce / (Ca + Ce)
    pub stability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotspotKind {
    HighComplexity,
    HighCoupling,
    CircularDependency,
    Unstable,
}

impl HotspotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotspotKind::HighComplexity => "high-complexity",
            HotspotKind::HighCoupling => "high-coupling",
            HotspotKind::CircularDependency => "circular-dependency",
            HotspotKind::Unstable => "unstable",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            HotspotKind::HighComplexity => "Split the class into smaller, focused classes",
            HotspotKind::HighCoupling => "Reduce coupling by depending on interfaces or introducing a facade",
            HotspotKind::CircularDependency => "Break the cycle by extracting the shared contract into its own type",
            HotspotKind::Unstable => "Move volatile dependencies behind abstractions",
        }
    }
}

impl std::fmt::Display for HotspotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub node_id: String,
    pub kind: HotspotKind,
    /// Measured value over its threshold (1.0 for cycle membership)
    pub score: f64,
    pub recommendations: Vec<String>,
}

impl Hotspot {
    fn new(node_id: &str, kind: HotspotKind, score: f64) -> Self {
        Self {
            node_id: node_id.to_string(),
            kind,
            score,
            recommendations: vec![kind.recommendation().to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyMetrics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub circular_dependencies: usize,
    pub average_coupling: f64,
    /// Share of edges that stay inside one package
    pub cohesion_score: f64,
    pub stability_index: f64,
    pub abstractness: f64,
    pub distance_from_main_sequence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub target: String,
    pub scope: DependencyScope,
    pub nodes: Vec<DependencyNode>,
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<Vec<String>>,
    pub hotspots: Vec<Hotspot>,
    pub metrics: DependencyMetrics,
}

pub struct DependencyAnalyzer<'a> {
    index: &'a CodeIndex,
    thresholds: HotspotThresholds,
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(index: &'a CodeIndex, thresholds: HotspotThresholds) -> Self {
        Self { index, thresholds }
    }

    pub fn analyze(&self, options: &DependencyOptions) -> Result<DependencyGraph> {
        let target = self
            .index
            .find_class(&options.target)
            .ok_or_else(|| Error::NotFound(format!("Class not found: {}", options.target)))?;

        let scope: Vec<&ClassNode> = match options.scope {
            DependencyScope::File => vec![target],
            DependencyScope::Package => self
                .index
                .classes()
                .values()
                .filter(|c| c.package == target.package)
                .collect(),
            DependencyScope::Global => self.index.classes().values().collect(),
        };

        let mut edges: Vec<DependencyEdge> = Vec::new();
        let mut seen: HashSet<(String, String, DependencyKind)> = HashSet::new();
        let mut same_package_edges = 0usize;
        for class in &scope {
            for (dependency, kind) in self.dependencies_of(class) {
                if !options.wants(kind) || dependency.id == class.id {
                    continue;
                }
                if seen.insert((class.id.clone(), dependency.id.clone(), kind)) {
                    if dependency.package == class.package {
                        same_package_edges += 1;
                    }
                    edges.push(DependencyEdge::new(&class.id, &dependency.id, kind, &class.file_path));
                }
            }
        }

        let mut graph = DirectedGraph::new();
        for class in &scope {
            graph.add_node(&class.id);
        }
        for edge in &edges {
            graph.add_edge(&edge.from, &edge.to);
        }
        let cycles = graph.find_cycles();
        let in_cycles = DirectedGraph::nodes_in_cycles(&cycles);

        let nodes: Vec<DependencyNode> = scope.iter().map(|class| self.node_for(class, &graph)).collect();
        let hotspots = self.hotspots(&scope, &edges, &graph, &in_cycles);
        let metrics = compute_metrics(&nodes, edges.len(), cycles.len(), same_package_edges);

        tracing::debug!(
            "Dependency graph for {} ({} scope): {}",
            target.name,
            options.scope,
            graph.stats()
        );

        Ok(DependencyGraph {
            target: target.id.clone(),
            scope: options.scope,
            nodes,
            edges,
            cycles,
            hotspots,
            metrics,
        })
    }

    /// Every (indexed class, kind) a class depends on, before filtering
    fn dependencies_of(&self, class: &ClassNode) -> Vec<(&'a ClassNode, DependencyKind)> {
        let index = self.index;
        let mut found = Vec::new();

        for name in class.superclass.iter().chain(class.interfaces.iter()) {
            if let Some(dep) = index.class(name) {
                found.push((dep, DependencyKind::Inheritance));
            }
        }

        for field in &class.fields {
            for token in type_tokens(field) {
                if let Some(dep) = index.class(token) {
                    found.push((dep, DependencyKind::Composition));
                }
            }
        }

        for method in &class.methods {
            for call in &method.calls {
                let callee_class = index
                    .method(call)
                    .filter(|callee| callee.class_name != class.name)
                    .and_then(|callee| index.class(&callee.class_name));
                if let Some(dep) = callee_class {
                    found.push((dep, DependencyKind::MethodCall));
                }
            }
        }

        for import in &class.imports {
            if let Some(dep) = last_segment(import).and_then(|name| index.class(name)) {
                found.push((dep, DependencyKind::Import));
            }
        }

        found
    }

    fn node_for(&self, class: &ClassNode, graph: &DirectedGraph) -> DependencyNode {
        let mut dependents: Vec<String> = class
            .subclasses
            .iter()
            .filter_map(|name| self.index.class(name))
            .map(|sub| sub.id.clone())
            .collect();
        for source in graph.predecessors(&class.id) {
            if !dependents.contains(source) {
                dependents.push(source.clone());
            }
        }

        DependencyNode {
            id: class.id.clone(),
            name: class.name.clone(),
            kind: class.class_type,
            file_path: class.file_path.clone(),
            dependencies: graph.successors(&class.id).to_vec(),
            dependents,
            complexity: class.methods.len() as u32,
            stability: graph.instability(&class.id),
        }
    }

    fn hotspots(
        &self,
        scope: &[&ClassNode],
        edges: &[DependencyEdge],
        graph: &DirectedGraph,
        in_cycles: &BTreeSet<String>,
    ) -> Vec<Hotspot> {
        let limits = &self.thresholds;
        let mut hotspots = Vec::new();

        // edges touching each node, one per kind
        let mut incident_edges: HashMap<&str, usize> = HashMap::new();
        for edge in edges {
            *incident_edges.entry(edge.from.as_str()).or_default() += 1;
            *incident_edges.entry(edge.to.as_str()).or_default() += 1;
        }

        for class in scope {
            let id = class.id.as_str();

            let methods = class.methods.len();
            if methods > limits.max_methods {
                hotspots.push(Hotspot::new(id, HotspotKind::HighComplexity, ratio(methods, limits.max_methods)));
            }

            let incident = incident_edges.get(id).copied().unwrap_or(0);
            if incident > limits.max_coupling {
                hotspots.push(Hotspot::new(id, HotspotKind::HighCoupling, ratio(incident, limits.max_coupling)));
            }

            if in_cycles.contains(id) {
                hotspots.push(Hotspot::new(id, HotspotKind::CircularDependency, 1.0));
            }

            let instability = graph.instability(id);
            if instability > limits.max_instability && graph.out_degree(id) >= limits.min_unstable_dependencies {
                hotspots.push(Hotspot::new(id, HotspotKind::Unstable, instability));
            }
        }

        hotspots
    }
}

fn ratio(value: usize, limit: usize) -> f64 {
    value as f64 / limit.max(1) as f64
}

fn compute_metrics(
    nodes: &[DependencyNode],
    total_edges: usize,
    circular_dependencies: usize,
    same_package_edges: usize,
) -> DependencyMetrics {
    let total_nodes = nodes.len();
    if total_nodes == 0 {
        return DependencyMetrics::default();
    }

    let n = total_nodes as f64;
    let interfaces = nodes.iter().filter(|node| node.kind == ClassType::Interface).count();
    let stability_index = 1.0 - circular_dependencies as f64 / n;
    let abstractness = interfaces as f64 / n;
    let cohesion_score = if total_edges == 0 {
        1.0
    } else {
        same_package_edges as f64 / total_edges as f64
    };

    DependencyMetrics {
        total_nodes,
        total_edges,
        circular_dependencies,
        average_coupling: total_edges as f64 / n,
        cohesion_score,
        stability_index,
        abstractness,
        distance_from_main_sequence: (abstractness + stability_index - 1.0).abs(),
    }
}

/// Identifier-like tokens of a field declaration (`List<User> users`)
fn type_tokens(field: &str) -> impl Iterator<Item = &str> {
    field
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
}

/// Last path segment of an import (`com.acme.User`, `./models/user`, `crate::db::Pool`)
fn last_segment(import: &str) -> Option<&str> {
    import
        .trim()
        .trim_end_matches(';')
        .rsplit(['.', '/', ':'])
        .find(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::model::MethodNode;

    fn class(package: &str, name: &str, class_type: ClassType) -> ClassNode {
        ClassNode::new(format!("{}/{}.java", package, name), name, class_type)
    }

    fn index(classes: Vec<ClassNode>, methods: Vec<MethodNode>) -> CodeIndex {
        CodeIndex::from_parts(
            methods.into_iter().map(|m| (m.name.clone(), m)).collect(),
            classes.into_iter().map(|c| (c.name.clone(), c)).collect::<BTreeMap<_, _>>(),
        )
    }

    fn analyzer(index: &CodeIndex) -> DependencyAnalyzer<'_> {
        DependencyAnalyzer::new(index, HotspotThresholds::default())
    }

    #[test]
    fn test_interface_cycle_global_scope() {
        let index = index(
            vec![
                class("src", "A", ClassType::Interface).implementing(["B"]),
                class("src", "B", ClassType::Interface).implementing(["C"]),
                class("src", "C", ClassType::Interface).implementing(["A"]),
            ],
            vec![],
        );

        let graph = analyzer(&index)
            .analyze(&DependencyOptions::new("A").with_scope(DependencyScope::Global))
            .unwrap();

        assert_eq!(graph.cycles.len(), 1);
        let members: BTreeSet<_> = graph.cycles[0].iter().cloned().collect();
        assert_eq!(members, BTreeSet::from(["src/A.java:A".to_string(), "src/B.java:B".to_string(), "src/C.java:C".to_string()]));
        assert!(graph.metrics.stability_index < 1.0);
        assert_eq!(graph.metrics.circular_dependencies, 1);
        assert_eq!(
            graph.hotspots.iter().filter(|h| h.kind == HotspotKind::CircularDependency).count(),
            3
        );
    }

    #[test]
    fn test_edge_kinds_and_type_filter() {
        let mut order = class("shop", "Order", ClassType::Class).extending("Entity");
        order.fields = vec!["List<LineItem> items".to_string()];
        order.imports = vec!["com.acme.billing.Invoice".to_string()];
        order.methods = vec![MethodNode::new("shop/Order.java", "Order", "checkout", 1, 9).with_calls(["charge"])];

        let index = index(
            vec![
                order,
                class("shop", "Entity", ClassType::Abstract),
                class("shop", "LineItem", ClassType::Class),
                class("billing", "Invoice", ClassType::Class),
                class("billing", "Payments", ClassType::Class),
            ],
            vec![MethodNode::new("billing/Payments.java", "Payments", "charge", 1, 4)],
        );

        let all = analyzer(&index).analyze(&DependencyOptions::new("Order").with_scope(DependencyScope::File)).unwrap();
        let kinds: Vec<_> = all.edges.iter().map(|e| (e.to.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("shop/Entity.java:Entity", DependencyKind::Inheritance),
                ("shop/LineItem.java:LineItem", DependencyKind::Composition),
                ("billing/Payments.java:Payments", DependencyKind::MethodCall),
                ("billing/Invoice.java:Invoice", DependencyKind::Import),
            ]
        );
        // out-of-scope targets are edges, not nodes
        assert_eq!(all.nodes.len(), 1);
        assert_eq!(all.nodes[0].dependencies.len(), 4);
        assert_eq!(all.metrics.cohesion_score, 0.5);
        // four outgoing edges and nothing incoming
        assert!(all.hotspots.iter().any(|h| h.kind == HotspotKind::Unstable));

        let filtered = analyzer(&index)
            .analyze(
                &DependencyOptions::new("Order")
                    .with_scope(DependencyScope::File)
                    .with_types([DependencyKind::Import, DependencyKind::MethodCall]),
            )
            .unwrap();
        assert_eq!(filtered.edges.len(), 2);
        assert!(filtered.edges.iter().all(|e| e.kind != DependencyKind::Inheritance));
    }

    #[test]
    fn test_package_scope_and_dependents() {
        let mut base = class("core", "Base", ClassType::Abstract);
        base.subclasses = vec!["Impl".to_string()];
        let index = index(
            vec![
                base,
                class("core", "Impl", ClassType::Class).extending("Base"),
                class("core", "Port", ClassType::Interface),
                class("web", "Handler", ClassType::Class).extending("Base"),
            ],
            vec![],
        );

        let graph = analyzer(&index).analyze(&DependencyOptions::new("Base")).unwrap();
        assert_eq!(graph.scope, DependencyScope::Package);
        assert_eq!(graph.nodes.len(), 3);

        let base = graph.nodes.iter().find(|n| n.name == "Base").unwrap();
        assert_eq!(base.dependents, vec!["core/Impl.java:Impl"]);
        assert_eq!(base.stability, 0.0);

        let impl_node = graph.nodes.iter().find(|n| n.name == "Impl").unwrap();
        assert_eq!(impl_node.stability, 1.0);

        let metrics = graph.metrics;
        assert_eq!(metrics.total_edges, 1);
        assert!((metrics.abstractness - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.stability_index, 1.0);
        assert!((metrics.distance_from_main_sequence - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.cohesion_score, 1.0);
    }

    #[test]
    fn test_complexity_and_coupling_hotspots() {
        let mut god = class("app", "God", ClassType::Class);
        god.methods = (0..12)
            .map(|i| MethodNode::new("app/God.java", "God", format!("m{}", i), i, i))
            .collect();
        god.fields = (0..6).map(|i| format!("Dep{} d{}", i, i)).collect();

        let mut classes = vec![god];
        classes.extend((0..6).map(|i| class("app", &format!("Dep{}", i), ClassType::Class)));
        let index = index(classes, vec![]);

        let graph = analyzer(&index).analyze(&DependencyOptions::new("God")).unwrap();
        let kinds: BTreeSet<_> = graph
            .hotspots
            .iter()
            .filter(|h| h.node_id == "app/God.java:God")
            .map(|h| h.kind.as_str())
            .collect();
        assert_eq!(kinds, BTreeSet::from(["high-complexity", "high-coupling", "unstable"]));

        let strict = DependencyAnalyzer::new(
            &index,
            HotspotThresholds { max_methods: 20, max_coupling: 20, max_instability: 1.0, min_unstable_dependencies: 3 },
        );
        assert!(strict.analyze(&DependencyOptions::new("God")).unwrap().hotspots.is_empty());
    }

    #[test]
    fn test_coupling_counts_each_edge_kind() {
        let mut hub = class("app", "Hub", ClassType::Class);
        hub.fields = (0..3).map(|i| format!("Dep{} d{}", i, i)).collect();
        hub.imports = (0..3).map(|i| format!("app.Dep{};", i)).collect();

        let mut classes = vec![hub];
        classes.extend((0..3).map(|i| class("app", &format!("Dep{}", i), ClassType::Class)));
        let index = index(classes, vec![]);

        let graph = analyzer(&index).analyze(&DependencyOptions::new("Hub")).unwrap();
        // three neighbours, each reached by composition and by import
        assert_eq!(graph.nodes.iter().find(|n| n.name == "Hub").unwrap().dependencies.len(), 3);
        let coupling = graph
            .hotspots
            .iter()
            .find(|h| h.kind == HotspotKind::HighCoupling)
            .unwrap();
        assert_eq!(coupling.node_id, "app/Hub.java:Hub");
        assert!((coupling.score - 6.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_target() {
        let err = analyzer(&CodeIndex::default()).analyze(&DependencyOptions::new("Ghost")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("com.acme.User;"), Some("User"));
        assert_eq!(last_segment("./models/user"), Some("user"));
        assert_eq!(last_segment("crate::db::Pool"), Some("Pool"));
        assert_eq!(last_segment(""), None);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(DependencyScope::from_str("GLOBAL").unwrap(), DependencyScope::Global);
        assert!(DependencyScope::from_str("galaxy").is_err());
    }
}
