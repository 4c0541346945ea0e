//! Inheritance Tree Builder

use std::collections::{BTreeMap, HashSet};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::index::CodeIndex;
use crate::model::{ClassNode, ClassType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritanceOptions {
    pub class_name: String,
    pub include_interfaces: bool,
    pub include_abstract: bool,
}

impl InheritanceOptions {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            include_interfaces: true,
            include_abstract: true,
        }
    }

    pub fn interfaces(mut self, include: bool) -> Self {
        self.include_interfaces = include;
        self
    }

    pub fn abstract_classes(mut self, include: bool) -> Self {
        self.include_abstract = include;
        self
    }

    fn admits(&self, class: &ClassNode) -> bool {
        match class.class_type {
            ClassType::Interface => self.include_interfaces,
            ClassType::Abstract => self.include_abstract,
            ClassType::Class | ClassType::Enum => true,
        }
    }
}

/// Subclass tree rooted at one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritanceTree {
    pub root: ClassNode,
    /// Every visited class, root included, keyed by name
    pub nodes: BTreeMap<String, ClassNode>,
    /// Longest subclass chain below the root
    pub depth: usize,
    pub interfaces: Vec<String>,
    pub abstract_classes: Vec<String>,
    pub concrete_classes: Vec<String>,
}

/// Walk down `superclass` links from the named class.
///
/// The root resolves by exact name, then case-insensitively. A visited set
/// stops cyclic superclass chains.
pub fn build_inheritance_tree(index: &CodeIndex, options: &InheritanceOptions) -> Result<InheritanceTree> {
    let root = index
        .find_class(&options.class_name)
        .ok_or_else(|| Error::NotFound(format!("Class not found: {}", options.class_name)))?;

    let mut children: BTreeMap<&str, Vec<&ClassNode>> = BTreeMap::new();
    for class in index.classes().values() {
        if let Some(parent) = class.superclass.as_deref() {
            children.entry(parent).or_default().push(class);
        }
    }

    let mut nodes = BTreeMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&ClassNode, usize)> = vec![(root, 0)];
    let mut depth = 0;
    visited.insert(root.name.as_str());

    while let Some((class, level)) = stack.pop() {
        depth = depth.max(level);
        nodes.insert(class.name.clone(), class.clone());

        for child in children.get(class.name.as_str()).into_iter().flatten().copied() {
            if !options.admits(child) || !visited.insert(child.name.as_str()) {
                continue;
            }
            stack.push((child, level + 1));
        }
    }

    let mut tree = InheritanceTree {
        root: root.clone(),
        nodes,
        depth,
        interfaces: Vec::new(),
        abstract_classes: Vec::new(),
        concrete_classes: Vec::new(),
    };
    for class in tree.nodes.values() {
        let bucket = match class.class_type {
            ClassType::Interface => &mut tree.interfaces,
            ClassType::Abstract => &mut tree.abstract_classes,
            ClassType::Class | ClassType::Enum => &mut tree.concrete_classes,
        };
        bucket.push(class.name.clone());
    }

    Ok(tree)
}
