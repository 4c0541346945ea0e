//! Index entries - methods and classes derived from chunks
//!
//! Both node types use `filePath:name` as their id, but the indices that hold
//! them are keyed by bare name.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Class name used when a method cannot be attributed to any class
pub const UNKNOWN_CLASS: &str = "Unknown";

/// Build the `filePath:name` id shared by methods and classes
pub fn node_id(file_path: &str, name: &str) -> String {
    format!("{}:{}", file_path, name)
}

/// Package of a file: its directory, with `/` separators
pub fn package_of(file_path: &str) -> String {
    Path::new(file_path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

/// Normalize a name for loose comparison (`user-service` == `UserService`)
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

const BRANCH_KEYWORDS: &[&str] = &[
    "if", "elif", "for", "foreach", "while", "case", "catch", "except", "when",
];

/// Decision-point estimate of cyclomatic complexity, never below 1
pub fn estimate_complexity(content: &str) -> u32 {
    let keywords = content
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| BRANCH_KEYWORDS.contains(word))
        .count();
    let operators = content.matches("&&").count() + content.matches("||").count();

    1 + (keywords + operators) as u32
}

/// Split the parenthesised part of a signature into parameter strings
pub fn parse_parameters(signature: &str) -> Vec<String> {
    let Some(open) = signature.find('(') else {
        return Vec::new();
    };
    let Some(close) = signature.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in signature[open + 1..close].chars() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            // `->` is an arrow, not a closing bracket
            '>' if current.ends_with('-') => {}
            '>' | ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                params.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    params.push(current);

    params
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Structural category of a class-index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    #[default]
    Class,
    Interface,
    Abstract,
    Enum,
}

impl ClassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Class => "class",
            ClassType::Interface => "interface",
            ClassType::Abstract => "abstract",
            ClassType::Enum => "enum",
        }
    }
}

impl FromStr for ClassType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "class" | "struct" | "concrete" => Ok(ClassType::Class),
            "interface" | "trait" | "protocol" => Ok(ClassType::Interface),
            "abstract" | "abstract class" => Ok(ClassType::Abstract),
            "enum" => Ok(ClassType::Enum),
            _ => Err(Error::Parse(format!("Unknown class type: {}", s))),
        }
    }
}

impl std::fmt::Display for ClassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function or method in the Method Index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodNode {
    /// `filePath:name`
    pub id: String,
    pub name: String,
    /// Containing class, or [`UNKNOWN_CLASS`]
    pub class_name: String,
    pub file_path: String,
    pub signature: String,
    pub modifiers: Vec<String>,
    /// Names this method references
    pub calls: Vec<String>,
    /// Names of indexed methods that reference this one
    pub called_by: Vec<String>,
    pub complexity: u32,
    pub lines_of_code: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub documentation: Option<String>,
}

impl MethodNode {
    /// Create a method with minimal required fields
    pub fn new(
        file_path: impl Into<String>,
        class_name: impl Into<String>,
        name: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let file_path = file_path.into();
        let name = name.into();

        Self {
            id: node_id(&file_path, &name),
            name,
            class_name: class_name.into(),
            file_path,
            signature: String::new(),
            modifiers: Vec::new(),
            calls: Vec::new(),
            called_by: Vec::new(),
            complexity: 1,
            lines_of_code: end_line.saturating_sub(start_line) + 1,
            start_line,
            end_line,
            parameters: Vec::new(),
            return_type: None,
            documentation: None,
        }
    }

    /// Set the referenced names
    pub fn with_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls = calls.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_attributed(&self) -> bool {
        self.class_name != UNKNOWN_CLASS
    }
}

/// A class, interface, abstract class or enum in the Class Index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNode {
    /// `filePath:name`
    pub id: String,
    pub name: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    pub superclass: Option<String>,
    /// Names of implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<String>,
    /// Names of classes whose superclass is this class
    pub subclasses: Vec<String>,
    pub methods: Vec<MethodNode>,
    pub fields: Vec<String>,
    pub modifiers: Vec<String>,
    /// Directory of the defining file
    pub package: String,
    pub imports: Vec<String>,
}

impl ClassNode {
    /// Create a class with minimal required fields
    pub fn new(file_path: impl Into<String>, name: impl Into<String>, class_type: ClassType) -> Self {
        let file_path = file_path.into();
        let name = name.into();

        Self {
            id: node_id(&file_path, &name),
            package: package_of(&file_path),
            name,
            file_path,
            class_type,
            superclass: None,
            interfaces: Vec::new(),
            subclasses: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            modifiers: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Set the superclass name
    pub fn extending(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Set the implemented interface names
    pub fn implementing<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interfaces = interfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_interface(&self) -> bool {
        self.class_type == ClassType::Interface
    }

    pub fn is_abstract(&self) -> bool {
        self.class_type == ClassType::Abstract
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.clone()).collect()
    }
}
