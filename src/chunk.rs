//! Code chunks - the parser's output and the engine's only input
//!
//! A chunk is a semantically meaningful span of source (function, class,
//! import, ...) produced by an external language-aware parser. The engine
//! never parses source itself; it reads chunks back from a [`ChunkStore`].
//!
//! [`ChunkStore`]: crate::storage::ChunkStore

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;

/// Kind of entity a chunk describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Variable,
    Interface,
    Type,
    Import,
    Export,
}

impl ChunkKind {
    /// Get the string representation of the chunk kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
            ChunkKind::Variable => "variable",
            ChunkKind::Interface => "interface",
            ChunkKind::Type => "type",
            ChunkKind::Import => "import",
            ChunkKind::Export => "export",
        }
    }

    /// Get all chunk kinds
    pub fn all() -> &'static [ChunkKind] {
        &[
            ChunkKind::Function,
            ChunkKind::Class,
            ChunkKind::Method,
            ChunkKind::Variable,
            ChunkKind::Interface,
            ChunkKind::Type,
            ChunkKind::Import,
            ChunkKind::Export,
        ]
    }

    /// Classes and interfaces become class-index entries
    pub fn is_type_definition(&self) -> bool {
        matches!(self, ChunkKind::Class | ChunkKind::Interface)
    }

    /// Functions and methods become method-index entries
    pub fn is_callable(&self) -> bool {
        matches!(self, ChunkKind::Function | ChunkKind::Method)
    }
}

impl FromStr for ChunkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "function" | "fn" | "func" | "def" => Ok(ChunkKind::Function),
            "class" | "struct" => Ok(ChunkKind::Class),
            "method" => Ok(ChunkKind::Method),
            "variable" | "var" | "const" | "let" | "field" => Ok(ChunkKind::Variable),
            "interface" | "trait" | "protocol" => Ok(ChunkKind::Interface),
            "type" | "alias" => Ok(ChunkKind::Type),
            "import" | "use" => Ok(ChunkKind::Import),
            "export" => Ok(ChunkKind::Export),
            _ => Err(Error::Parse(format!("Unknown chunk kind: {}", s))),
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Languages the index builder accepts, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }

    /// Infer the language of a file. Unrecognized extensions yield `None`.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "java" => Some(Language::Java),
            "ts" | "tsx" => Some(Language::TypeScript),
            "js" | "jsx" => Some(Language::JavaScript),
            "py" => Some(Language::Python),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed span of source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    /// Store-wide unique identifier
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ChunkKind,
    pub name: String,
    /// Full source text of the span
    pub content: String,
    pub file_path: String,
    pub language: String,
    /// Starting line (1-indexed)
    pub start_line: u32,
    /// Ending line (1-indexed, inclusive)
    pub end_line: u32,
    #[serde(default)]
    pub start_column: u32,
    #[serde(default)]
    pub end_column: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    /// Names this span references. Non-string entries are dropped on read.
    #[serde(default, deserialize_with = "string_entries")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// Unix timestamp (milliseconds) of when the chunk was produced
    #[serde(default)]
    pub timestamp: i64,
}

impl CodeChunk {
    /// Create a chunk with the required fields; everything else is empty.
    pub fn new(
        file_path: impl Into<String>,
        kind: ChunkKind,
        name: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        let name = name.into();
        let language = Language::from_path(&file_path)
            .map(|l| l.as_str().to_string())
            .unwrap_or_default();

        Self {
            id: format!("{}#{}:{}@{}", file_path, kind, name, start_line),
            kind,
            name,
            content: content.into(),
            file_path,
            language,
            start_line,
            end_line,
            start_column: 0,
            end_column: 0,
            signature: None,
            documentation: None,
            dependencies: Vec::new(),
            metadata: None,
            timestamp: 0,
        }
    }

    /// Set the signature
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Set the documentation string
    pub fn with_documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    /// Set the referenced names
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Attach one metadata entry, creating the map on first use
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// True when the chunk cannot describe a real entity
    pub fn is_malformed(&self) -> bool {
        self.name.trim().is_empty() || self.end_line < self.start_line
    }

    /// Whether this chunk's line range encloses `other`'s
    pub fn contains_range(&self, other: &CodeChunk) -> bool {
        self.start_line <= other.start_line && self.end_line >= other.end_line
    }

    /// Look up the first metadata key with a non-null value
    fn meta(&self, keys: &[&str]) -> Option<&Value> {
        let map = self.metadata.as_ref()?;
        keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
    }

    /// A string metadata value
    pub fn meta_str(&self, keys: &[&str]) -> Option<String> {
        match self.meta(keys)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// A list metadata value; a bare string counts as a one-element list
    pub fn meta_list(&self, keys: &[&str]) -> Vec<String> {
        match self.meta(keys) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// A non-negative integer metadata value
    pub fn meta_u32(&self, keys: &[&str]) -> Option<u32> {
        self.meta(keys)?.as_u64().map(|n| n.min(u32::MAX as u64) as u32)
    }
}

fn string_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect())
}

/// Filter for [`ChunkStore::search_chunks`]. Unset fields match everything.
///
/// [`ChunkStore::search_chunks`]: crate::storage::ChunkStore::search_chunks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkQuery {
    pub file_path: Option<String>,
    pub language: Option<String>,
    pub kind: Option<ChunkKind>,
    pub name: Option<String>,
    /// Substring match against the chunk content
    pub content: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ChunkQuery {
    /// Query matching every chunk in the store
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_file(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_kind_roundtrip() {
        for kind in ChunkKind::all() {
            let parsed: ChunkKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_chunk_kind_aliases() {
        assert_eq!(ChunkKind::from_str("trait").unwrap(), ChunkKind::Interface);
        assert_eq!(ChunkKind::from_str("fn").unwrap(), ChunkKind::Function);
        assert!(ChunkKind::from_str("widget").is_err());
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path("src/App.java"), Some(Language::Java));
        assert_eq!(Language::from_path("web/view.tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_path("web/util.jsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_path("lib/main.rs"), Some(Language::Rust));
        assert_eq!(Language::from_path("README.md"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_deserialize_drops_non_string_dependencies() {
        let chunk: CodeChunk = serde_json::from_value(json!({
            "id": "c1",
            "type": "method",
            "name": "login",
            "content": "void login() {}",
            "filePath": "src/Auth.java",
            "language": "java",
            "startLine": 3,
            "endLine": 9,
            "dependencies": ["validate", 42, null, "audit"]
        }))
        .unwrap();

        assert_eq!(chunk.kind, ChunkKind::Method);
        assert_eq!(chunk.dependencies, vec!["validate", "audit"]);
        assert!(!chunk.has_metadata());
    }

    #[test]
    fn test_metadata_accessors() {
        let chunk = CodeChunk::new("src/A.java", ChunkKind::Class, "A", 1, 20, "class A {}")
            .with_metadata("extends", json!("Base"))
            .with_metadata("implements", json!(["Runnable", 3, "Closeable"]))
            .with_metadata("complexity", json!(7));

        assert_eq!(chunk.meta_str(&["superclass", "extends"]), Some("Base".to_string()));
        assert_eq!(chunk.meta_list(&["interfaces", "implements"]), vec!["Runnable", "Closeable"]);
        assert_eq!(chunk.meta_u32(&["complexity"]), Some(7));
        assert!(chunk.meta_list(&["fields"]).is_empty());
    }

    #[test]
    fn test_null_metadata_falls_through_to_next_key() {
        let chunk = CodeChunk::new("src/A.java", ChunkKind::Class, "A", 1, 20, "class A {}")
            .with_metadata("superclass", Value::Null)
            .with_metadata("extends", json!("Base"));

        assert_eq!(chunk.meta_str(&["superclass", "extends"]), Some("Base".to_string()));
        assert_eq!(chunk.meta_str(&["superclass"]), None);
    }

    #[test]
    fn test_malformed_and_containment() {
        let class = CodeChunk::new("a.py", ChunkKind::Class, "A", 1, 30, "");
        let method = CodeChunk::new("a.py", ChunkKind::Method, "run", 5, 10, "");
        let broken = CodeChunk::new("a.py", ChunkKind::Method, "", 5, 10, "");

        assert!(class.contains_range(&method));
        assert!(!method.contains_range(&class));
        assert!(broken.is_malformed());
        assert_eq!(class.language, "python");
    }
}
