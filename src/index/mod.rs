//! Method and Class indices
//!
//! [`IndexBuilder`] owns the mutable maps while chunks are being consumed and
//! freezes into a [`CodeIndex`], which only offers read access. Both maps are
//! keyed by bare entity name, so same-named entities from different files
//! collide and the last one indexed wins.

pub mod builder;
pub mod persistence;

pub use builder::{IndexBuilder, IndexStats};
pub use persistence::SnapshotPaths;

use std::collections::BTreeMap;
use crate::model::{ClassNode, MethodNode};

/// Read-only view of the Method Index and Class Index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeIndex {
    methods: BTreeMap<String, MethodNode>,
    classes: BTreeMap<String, ClassNode>,
}

impl CodeIndex {
    /// Assemble an index from already-finished maps (e.g. a loaded snapshot)
    pub fn from_parts(methods: BTreeMap<String, MethodNode>, classes: BTreeMap<String, ClassNode>) -> Self {
        Self { methods, classes }
    }

    pub fn methods(&self) -> &BTreeMap<String, MethodNode> {
        &self.methods
    }

    pub fn classes(&self) -> &BTreeMap<String, ClassNode> {
        &self.classes
    }

    pub fn method(&self, name: &str) -> Option<&MethodNode> {
        self.methods.get(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassNode> {
        self.classes.get(name)
    }

    /// Find a method by its `filePath:name` id
    pub fn method_by_id(&self, id: &str) -> Option<&MethodNode> {
        self.methods.values().find(|m| m.id == id)
    }

    /// Resolve a class by exact name, then case-insensitively
    pub fn find_class(&self, name: &str) -> Option<&ClassNode> {
        self.classes.get(name).or_else(|| {
            self.classes
                .values()
                .find(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.classes.is_empty()
    }
}
