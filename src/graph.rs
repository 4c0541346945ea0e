//! Directed graph over node ids
//!
//! A small adjacency structure shared by the call-graph tracer and the
//! dependency analyzer: outgoing/incoming lists, coupling counts and
//! cycle detection.

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Directed graph keyed by string node ids.
///
/// Nodes keep their insertion order so traversals (and the cycles they
/// report) are deterministic.
#[derive(Debug, Default, Clone)]
pub struct DirectedGraph {
    /// Node ids in insertion order
    nodes: Vec<String>,
    known: HashSet<String>,
    /// Outgoing neighbours, deduplicated, in insertion order
    edges_from: BTreeMap<String, Vec<String>>,
    /// Incoming neighbours, deduplicated, in insertion order
    edges_to: BTreeMap<String, Vec<String>>,
}

impl DirectedGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if not already present
    pub fn add_node(&mut self, id: &str) {
        if self.known.insert(id.to_string()) {
            self.nodes.push(id.to_string());
        }
    }

    /// Add an edge, registering both endpoints. Parallel edges collapse.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);

        let out = self.edges_from.entry(from.to_string()).or_default();
        if !out.iter().any(|n| n == to) {
            out.push(to.to_string());
            self.edges_to
                .entry(to.to_string())
                .or_default()
                .push(from.to_string());
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Outgoing neighbours of a node
    pub fn successors(&self, id: &str) -> &[String] {
        self.edges_from.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Incoming neighbours of a node
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.edges_to.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Efferent coupling (Ce): distinct nodes this node depends on
    pub fn out_degree(&self, id: &str) -> usize {
        self.successors(id).len()
    }

    /// Afferent coupling (Ca): distinct nodes depending on this node
    pub fn in_degree(&self, id: &str) -> usize {
        self.predecessors(id).len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges_from.values().map(|v| v.len()).sum()
    }

    /// Martin instability Ce / (Ca + Ce); 0 for an isolated node
    pub fn instability(&self, id: &str) -> f64 {
        let ce = self.out_degree(id) as f64;
        let ca = self.in_degree(id) as f64;
        if ce + ca == 0.0 { 0.0 } else { ce / (ca + ce) }
    }

    /// Find cycles with a depth-first search over an explicit frame stack.
    ///
    /// A neighbour that is still on the recursion stack closes a cycle; the
    /// cycle reported is the path slice from that neighbour's first
    /// occurrence to the current node. Each node is entered at most once, so
    /// this reports the cycles a single DFS forest sees, not every
    /// elementary cycle.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();

        for start in &self.nodes {
            if visited.contains(start.as_str()) {
                continue;
            }

            let mut on_stack: HashSet<&str> = HashSet::new();
            let mut path: Vec<&str> = Vec::new();
            // (node, index of the next successor to explore)
            let mut frames: Vec<(&str, usize)> = Vec::new();

            let start = start.as_str();
            visited.insert(start);
            on_stack.insert(start);
            path.push(start);
            frames.push((start, 0));

            while let Some(frame) = frames.last_mut() {
                let next = self.successors(frame.0).get(frame.1);
                frame.1 += 1;

                match next {
                    Some(child) => {
                        let child = child.as_str();
                        if on_stack.contains(child) {
                            if let Some(pos) = path.iter().position(|n| *n == child) {
                                cycles.push(path[pos..].iter().map(|s| s.to_string()).collect());
                            }
                        } else if visited.insert(child) {
                            on_stack.insert(child);
                            path.push(child);
                            frames.push((child, 0));
                        }
                    }
                    None => {
                        if let Some((done, _)) = frames.pop() {
                            on_stack.remove(done);
                            path.pop();
                        }
                    }
                }
            }
        }

        cycles
    }

    /// Ids of every node that sits on at least one cycle
    pub fn nodes_in_cycles(cycles: &[Vec<String>]) -> BTreeSet<String> {
        cycles.iter().flatten().cloned().collect()
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edge_count(),
            cycles: self.find_cycles().len(),
        }
    }
}

/// Statistics about a directed graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub cycles: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} nodes, {} edges, {} cycles", self.nodes, self.edges, self.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DirectedGraph {
        let mut g = DirectedGraph::new();
        for (from, to) in edges {
            g.add_edge(from, to);
        }
        g
    }

    #[test]
    fn test_parallel_edges_collapse() {
        let g = graph(&[("a", "b"), ("a", "b"), ("b", "c")]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.successors("a"), ["b".to_string()]);
        assert_eq!(g.predecessors("b"), ["a".to_string()]);
        assert_eq!(g.nodes(), ["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_three_node_cycle() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let cycles = g.find_cycles();

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_slice_excludes_tail() {
        // x leads into the b <-> c loop but is not part of it
        let g = graph(&[("x", "b"), ("b", "c"), ("c", "b")]);
        let cycles = g.find_cycles();

        assert_eq!(cycles, vec![vec!["b".to_string(), "c".to_string()]]);
        let members = DirectedGraph::nodes_in_cycles(&cycles);
        assert!(!members.contains("x"));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&[("a", "a")]);
        assert_eq!(g.find_cycles(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_acyclic_graph() {
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        assert!(g.find_cycles().is_empty());
        assert_eq!(g.stats().cycles, 0);
    }

    #[test]
    fn test_instability() {
        let g = graph(&[("a", "b"), ("a", "c"), ("d", "a")]);
        assert!((g.instability("a") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(g.instability("b"), 0.0);

        let mut lone = DirectedGraph::new();
        lone.add_node("z");
        assert_eq!(lone.instability("z"), 0.0);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut g = DirectedGraph::new();
        for i in 0..50_000 {
            g.add_edge(&format!("n{}", i), &format!("n{}", i + 1));
        }
        g.add_edge("n50000", "n0");

        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 50_001);
    }
}
