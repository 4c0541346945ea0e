//! Edge types - relationships recorded by the analyses
//!
//! Call-graph edges link methods; dependency edges link classes and carry one
//! of four dependency kinds:
//! - `Inheritance`: superclass or implemented interface
//! - `Composition`: a field typed by another class
//! - `MethodCall`: a method calling into another class
//! - `Import`: an import naming another class

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a call edge's target was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Resolved by name against the Method Index
    Direct,
    /// Resolved through the vector-similarity fallback
    Semantic,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Direct => "direct",
            CallKind::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An edge in a method call graph.
///
/// `weight` is the confidence of the resolution that produced it
/// (1.0 = exact name match).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    /// Caller method id
    pub from: String,
    /// Callee method id
    pub to: String,
    pub kind: CallKind,
    pub weight: f32,
    /// File of the calling method
    pub file_path: String,
    /// First line of the calling method
    pub line: u32,
}

/// Kinds of class-to-class dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Import,
    Inheritance,
    Composition,
    MethodCall,
}

impl DependencyKind {
    /// Get the string representation of the dependency kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
            DependencyKind::Inheritance => "inheritance",
            DependencyKind::Composition => "composition",
            DependencyKind::MethodCall => "method-call",
        }
    }

    /// Get all dependency kinds
    pub fn all() -> &'static [DependencyKind] {
        &[
            DependencyKind::Import,
            DependencyKind::Inheritance,
            DependencyKind::Composition,
            DependencyKind::MethodCall,
        ]
    }

    /// Coupling strength recorded on edges of this kind
    pub fn strength(&self) -> f32 {
        match self {
            DependencyKind::Inheritance => 1.0,
            DependencyKind::Composition => 0.8,
            DependencyKind::MethodCall => 0.6,
            DependencyKind::Import => 0.4,
        }
    }
}

impl FromStr for DependencyKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "import" | "imports" => Ok(DependencyKind::Import),
            "inheritance" | "inherits" | "extends" | "implements" => Ok(DependencyKind::Inheritance),
            "composition" | "field" | "has" => Ok(DependencyKind::Composition),
            "method-call" | "method_call" | "call" | "calls" => Ok(DependencyKind::MethodCall),
            _ => Err(crate::Error::Parse(format!("Unknown dependency kind: {}", s))),
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An edge in a class dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    /// Dependent class id
    pub from: String,
    /// Dependency class id
    pub to: String,
    pub kind: DependencyKind,
    pub strength: f32,
    /// File of the dependent class
    pub file_path: String,
}

impl DependencyEdge {
    /// Create an edge with the kind's default strength
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: DependencyKind, file_path: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            strength: kind.strength(),
            file_path: file_path.into(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kind_roundtrip() {
        for kind in DependencyKind::all() {
            let parsed: DependencyKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_dependency_kind_aliases() {
        assert_eq!(DependencyKind::from_str("extends").unwrap(), DependencyKind::Inheritance);
        assert_eq!(DependencyKind::from_str("method_call").unwrap(), DependencyKind::MethodCall);
        assert!(DependencyKind::from_str("friendship").is_err());
    }

    #[test]
    fn test_edge_strength_follows_kind() {
        let edge = DependencyEdge::new("a:A", "b:B", DependencyKind::Composition, "a");
        assert_eq!(edge.strength, 0.8);
        assert!(!edge.is_self_loop());
        assert!(DependencyKind::Inheritance.strength() > DependencyKind::Import.strength());
    }

    #[test]
    fn test_serialized_kind_names() {
        let json = serde_json::to_string(&DependencyKind::MethodCall).unwrap();
        assert_eq!(json, "\"method-call\"");
        assert_eq!(serde_json::to_string(&CallKind::Semantic).unwrap(), "\"semantic\"");
    }
}
