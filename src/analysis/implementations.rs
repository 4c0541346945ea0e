//! Implementation Finder

use std::collections::{BTreeMap, HashSet, VecDeque};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::index::CodeIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationOptions {
    pub interface_name: String,
    pub include_subinterfaces: bool,
}

impl ImplementationOptions {
    pub fn new(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            include_subinterfaces: false,
        }
    }

    pub fn with_subinterfaces(mut self, include: bool) -> Self {
        self.include_subinterfaces = include;
        self
    }
}

/// A class conforming to an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// The interface the class declares (a sub-interface when reached through one)
    pub interface_name: String,
    pub implementation_name: String,
    pub file_path: String,
    pub methods: Vec<String>,
    pub is_abstract: bool,
    pub package: String,
}

/// Class Index entries whose `interfaces` list names the interface,
/// sub-interfaces included.
///
/// With sub-interfaces enabled, interfaces extending the target are walked
/// breadth-first and their implementers are included too. Results are
/// unique by implementation name and sorted by it.
pub fn find_implementations(index: &CodeIndex, options: &ImplementationOptions) -> Result<Vec<Implementation>> {
    let root = index
        .class(&options.interface_name)
        .filter(|c| c.is_interface())
        .ok_or_else(|| Error::NotFound(format!("Interface not found: {}", options.interface_name)))?;

    let mut found: BTreeMap<String, Implementation> = BTreeMap::new();
    let mut visited: HashSet<&str> = HashSet::from([root.name.as_str()]);
    let mut queue: VecDeque<&str> = VecDeque::from([root.name.as_str()]);

    while let Some(interface) = queue.pop_front() {
        let conforming = index
            .classes()
            .values()
            .filter(|c| c.interfaces.iter().any(|i| i == interface));

        for class in conforming {
            if class.is_interface()
                && options.include_subinterfaces
                && visited.insert(class.name.as_str())
            {
                queue.push_back(class.name.as_str());
            }

            found.entry(class.name.clone()).or_insert_with(|| Implementation {
                interface_name: interface.to_string(),
                implementation_name: class.name.clone(),
                file_path: class.file_path.clone(),
                methods: class.method_names(),
                is_abstract: class.is_abstract() || class.is_interface(),
                package: class.package.clone(),
            });
        }
    }

    Ok(found.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassNode, ClassType, MethodNode};

    fn index(classes: Vec<ClassNode>) -> CodeIndex {
        CodeIndex::from_parts(
            BTreeMap::new(),
            classes.into_iter().map(|c| (c.name.clone(), c)).collect(),
        )
    }

    fn sample() -> CodeIndex {
        let mut card = ClassNode::new("pay/CardGateway.ts", "CardGateway", ClassType::Class).implementing(["Gateway"]);
        card.methods = vec![MethodNode::new("pay/CardGateway.ts", "CardGateway", "charge", 3, 9)];

        index(vec![
            ClassNode::new("pay/Gateway.ts", "Gateway", ClassType::Interface),
            ClassNode::new("pay/Refundable.ts", "Refundable", ClassType::Interface).implementing(["Gateway"]),
            card,
            ClassNode::new("pay/BaseGateway.ts", "BaseGateway", ClassType::Abstract).implementing(["Gateway", "Audited"]),
            ClassNode::new("pay/Paypal.ts", "Paypal", ClassType::Class).implementing(["Refundable"]),
            ClassNode::new("pay/Ledger.ts", "Ledger", ClassType::Class),
        ])
    }

    #[test]
    fn test_direct_implementers_exactly() {
        let index = sample();
        let found = find_implementations(&index, &ImplementationOptions::new("Gateway")).unwrap();

        let names: Vec<_> = found.iter().map(|i| i.implementation_name.as_str()).collect();
        assert_eq!(names, vec!["BaseGateway", "CardGateway", "Refundable"]);

        let card = &found[1];
        assert_eq!(card.methods, vec!["charge"]);
        assert_eq!(card.package, "pay");
        assert!(!card.is_abstract);
        assert!(found[0].is_abstract);
        // a sub-interface conforms but cannot be instantiated
        assert!(found[2].is_abstract);
        assert_eq!(found[2].interface_name, "Gateway");
    }

    #[test]
    fn test_subinterface_implementers() {
        let index = sample();
        let found = find_implementations(&index, &ImplementationOptions::new("Gateway").with_subinterfaces(true)).unwrap();

        let names: Vec<_> = found.iter().map(|i| i.implementation_name.as_str()).collect();
        assert_eq!(names, vec!["BaseGateway", "CardGateway", "Paypal", "Refundable"]);
        assert_eq!(found[2].interface_name, "Refundable");
        assert_eq!(found[3].interface_name, "Gateway");
    }

    #[test]
    fn test_not_an_interface() {
        let index = sample();
        let err = find_implementations(&index, &ImplementationOptions::new("Ledger")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(find_implementations(&index, &ImplementationOptions::new("Missing")).is_err());
    }
}
