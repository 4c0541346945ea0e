//! Index Builder
//!
//! Turns the chunks of every file in the store into Method Index and Class
//! Index entries. Each file is indexed in two passes:
//! 1. class/interface chunks become [`ClassNode`]s
//! 2. function/method chunks become [`MethodNode`]s, attributed to a class
//!
//! After all files are consumed, a backfill pass fills in the reverse
//! relationships (`calledBy`, `subclasses`) that no single chunk carries.

use std::collections::{BTreeMap, HashSet};
use serde::Serialize;
use crate::{Error, Result};
use crate::chunk::{ChunkKind, CodeChunk, Language};
use crate::model::{
    estimate_complexity, parse_parameters, ClassNode, ClassType, MethodNode, UNKNOWN_CLASS,
};
use crate::storage::ChunkStore;
use super::CodeIndex;

/// Counters reported by a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub files_indexed: usize,
    /// Files with an unrecognized extension
    pub files_skipped: usize,
    /// Files whose chunks could not be read or were malformed
    pub files_failed: usize,
    pub chunks_skipped: usize,
    pub classes: usize,
    pub methods: usize,
    pub loaded_from_snapshot: bool,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index Statistics:")?;
        writeln!(f, "  Files: {} indexed, {} skipped, {} failed",
            self.files_indexed, self.files_skipped, self.files_failed)?;
        writeln!(f, "  Classes: {}", self.classes)?;
        writeln!(f, "  Methods: {}", self.methods)?;
        write!(f, "  Malformed chunks skipped: {}", self.chunks_skipped)
    }
}

/// Mutable build-time state. Consumed by [`IndexBuilder::finish`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    methods: BTreeMap<String, MethodNode>,
    classes: BTreeMap<String, ClassNode>,
    /// Class names whose current entry came from a chunk with metadata
    enriched: HashSet<String>,
    stats: IndexStats,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every file known to the store.
    ///
    /// Only a failure to enumerate the store is fatal; per-file failures are
    /// logged and the file is skipped.
    pub async fn build_from_store(store: &dyn ChunkStore) -> Result<(CodeIndex, IndexStats)> {
        let paths = store
            .list_files()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("cannot enumerate chunks: {}", e)))?;

        tracing::info!("Indexing {} files", paths.len());

        let mut builder = Self::new();
        for path in &paths {
            if let Err(e) = builder.index_file(store, path).await {
                tracing::warn!("Failed to index {}: {}", path, e);
                builder.stats.files_failed += 1;
            }
        }

        Ok(builder.finish())
    }

    /// Index one file. Returns `false` when the file's language is not
    /// supported and it was skipped.
    pub async fn index_file(&mut self, store: &dyn ChunkStore, file_path: &str) -> Result<bool> {
        if Language::from_path(file_path).is_none() {
            tracing::debug!("Skipping {} (unsupported extension)", file_path);
            self.stats.files_skipped += 1;
            return Ok(false);
        }

        let chunks = store.get_chunks_by_file(file_path).await?;
        self.index_chunks(&chunks)?;
        Ok(true)
    }

    /// Run both passes over the chunks of a single file.
    ///
    /// A file with any malformed chunk is rejected whole; nothing from it
    /// is registered.
    pub fn index_chunks(&mut self, chunks: &[CodeChunk]) -> Result<()> {
        let malformed: Vec<&CodeChunk> = chunks.iter().filter(|c| c.is_malformed()).collect();
        if let Some(first) = malformed.first() {
            for chunk in &malformed {
                tracing::debug!("Malformed chunk {} in {}", chunk.id, chunk.file_path);
            }
            self.stats.chunks_skipped += malformed.len();
            return Err(Error::Parse(format!(
                "{} malformed chunk(s) in {}",
                malformed.len(),
                first.file_path
            )));
        }

        // Pass 1: classes and interfaces
        let local_classes: Vec<&CodeChunk> = chunks
            .iter()
            .filter(|c| c.kind.is_type_definition())
            .collect();
        for chunk in &local_classes {
            self.register_class(chunk);
        }

        // Pass 2: functions and methods
        for chunk in chunks.iter().filter(|c| c.kind.is_callable()) {
            let class_name = chunk
                .meta_str(&["className", "class_name", "parentClass"])
                .or_else(|| enclosing_class(&local_classes, chunk).map(|c| c.name.clone()))
                .unwrap_or_else(|| UNKNOWN_CLASS.to_string());

            let method = method_from_chunk(chunk, class_name);
            if let Some(class) = self.classes.get_mut(&method.class_name) {
                class.methods.push(method.clone());
            }
            self.methods.insert(method.name.clone(), method);
        }

        self.stats.files_indexed += 1;
        Ok(())
    }

    fn register_class(&mut self, chunk: &CodeChunk) {
        let has_metadata = chunk.has_metadata();
        if !has_metadata && self.enriched.contains(&chunk.name) {
            tracing::debug!(
                "Keeping enriched entry for {}; ignoring bare chunk in {}",
                chunk.name,
                chunk.file_path
            );
            return;
        }

        if has_metadata {
            self.enriched.insert(chunk.name.clone());
        } else {
            self.enriched.remove(&chunk.name);
        }
        self.classes.insert(chunk.name.clone(), class_from_chunk(chunk));
    }

    /// Backfill reverse relationships and freeze the maps
    pub fn finish(mut self) -> (CodeIndex, IndexStats) {
        self.backfill_callers();
        self.backfill_subclasses();
        self.refresh_class_methods();

        self.stats.classes = self.classes.len();
        self.stats.methods = self.methods.len();
        tracing::info!(
            "Indexed {} classes and {} methods from {} files",
            self.stats.classes,
            self.stats.methods,
            self.stats.files_indexed
        );

        (CodeIndex::from_parts(self.methods, self.classes), self.stats)
    }

    fn backfill_callers(&mut self) {
        let links: Vec<(String, String)> = self
            .methods
            .values()
            .flat_map(|caller| {
                caller
                    .calls
                    .iter()
                    .filter(|callee| **callee != caller.name && self.methods.contains_key(*callee))
                    .map(move |callee| (callee.clone(), caller.name.clone()))
            })
            .collect();

        for (callee, caller) in links {
            if let Some(target) = self.methods.get_mut(&callee) {
                if !target.called_by.contains(&caller) {
                    target.called_by.push(caller);
                }
            }
        }
    }

    fn backfill_subclasses(&mut self) {
        let links: Vec<(String, String)> = self
            .classes
            .values()
            .filter_map(|class| {
                let parent = class.superclass.as_ref()?;
                (*parent != class.name && self.classes.contains_key(parent))
                    .then(|| (parent.clone(), class.name.clone()))
            })
            .collect();

        for (parent, child) in links {
            if let Some(target) = self.classes.get_mut(&parent) {
                if !target.subclasses.contains(&child) {
                    target.subclasses.push(child);
                }
            }
        }
    }

    /// Class method lists hold copies; bring them in line with the index
    fn refresh_class_methods(&mut self) {
        for class in self.classes.values_mut() {
            for method in class.methods.iter_mut() {
                if let Some(current) = self.methods.get(&method.name).filter(|m| m.id == method.id) {
                    *method = current.clone();
                }
            }
        }
    }
}

/// Innermost class chunk whose line range contains the method
fn enclosing_class<'a>(classes: &[&'a CodeChunk], method: &CodeChunk) -> Option<&'a CodeChunk> {
    classes
        .iter()
        .copied()
        .filter(|c| c.contains_range(method))
        .min_by_key(|c| c.end_line - c.start_line)
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn class_from_chunk(chunk: &CodeChunk) -> ClassNode {
    let modifiers = chunk.meta_list(&["modifiers"]);
    let is_interface = chunk.kind == ChunkKind::Interface;

    let class_type = if is_interface {
        ClassType::Interface
    } else {
        let declared = chunk
            .meta_str(&["classType", "class_type"])
            .and_then(|t| t.parse::<ClassType>().ok())
            .unwrap_or_default();
        if declared == ClassType::Class && modifiers.iter().any(|m| m == "abstract") {
            ClassType::Abstract
        } else {
            declared
        }
    };

    // `extends` may be a single name or a list: interfaces extend
    // interfaces, classes take the first entry as their superclass.
    let extends = chunk.meta_list(&["extends"]);
    let mut interfaces = chunk.meta_list(&["interfaces", "implements"]);
    let mut superclass = chunk.meta_str(&["superclass", "superClass"]);
    if is_interface {
        interfaces.extend(extends);
    } else {
        let mut rest = extends.into_iter();
        if superclass.is_none() {
            superclass = rest.next();
        }
        interfaces.extend(rest);
    }

    let mut node = ClassNode::new(&chunk.file_path, &chunk.name, class_type);
    node.superclass = superclass;
    node.interfaces = dedup(interfaces);
    node.fields = chunk.meta_list(&["fields", "properties"]);
    node.modifiers = modifiers;
    node.imports = chunk.meta_list(&["imports"]);
    node
}

fn method_from_chunk(chunk: &CodeChunk, class_name: String) -> MethodNode {
    let signature = chunk
        .signature
        .clone()
        .unwrap_or_else(|| chunk.content.lines().next().unwrap_or_default().trim().to_string());

    let parameters = match chunk.meta_list(&["parameters", "params"]) {
        declared if !declared.is_empty() => declared,
        _ => parse_parameters(&signature),
    };

    let mut method = MethodNode::new(&chunk.file_path, class_name, &chunk.name, chunk.start_line, chunk.end_line);
    method.modifiers = chunk.meta_list(&["modifiers"]);
    method.calls = dedup(chunk.dependencies.clone());
    method.complexity = chunk
        .meta_u32(&["complexity"])
        .unwrap_or_else(|| estimate_complexity(&chunk.content))
        .max(1);
    method.parameters = parameters;
    method.return_type = chunk.meta_str(&["returnType", "return_type"]);
    method.documentation = chunk.documentation.clone();
    method.signature = signature;
    method
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkQuery;
    use crate::storage::SqliteChunkStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;

    fn class_chunk(path: &str, name: &str, start: u32, end: u32) -> CodeChunk {
        CodeChunk::new(path, ChunkKind::Class, name, start, end, format!("class {} {{}}", name))
    }

    fn method_chunk(path: &str, name: &str, start: u32, end: u32) -> CodeChunk {
        CodeChunk::new(path, ChunkKind::Method, name, start, end, format!("void {}() {{}}", name))
    }

    async fn build(chunks: &[CodeChunk]) -> (CodeIndex, IndexStats) {
        let store = SqliteChunkStore::open_in_memory().unwrap();
        store.insert_chunks(chunks).unwrap();
        IndexBuilder::build_from_store(&store).await.unwrap()
    }

    #[tokio::test]
    async fn test_methods_attributed_by_line_range() {
        let (index, stats) = build(&[
            class_chunk("src/Auth.java", "Auth", 1, 40),
            method_chunk("src/Auth.java", "login", 5, 15),
            method_chunk("src/Auth.java", "helper", 50, 55),
            method_chunk("src/Auth.java", "audit", 60, 70).with_metadata("className", json!("Auditor")),
        ])
        .await;

        assert_eq!(index.method("login").unwrap().class_name, "Auth");
        assert_eq!(index.method("helper").unwrap().class_name, UNKNOWN_CLASS);
        assert_eq!(index.method("audit").unwrap().class_name, "Auditor");
        assert_eq!(index.class("Auth").unwrap().method_names(), vec!["login"]);
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.methods, 3);
    }

    #[tokio::test]
    async fn test_nested_class_takes_innermost() {
        let (index, _) = build(&[
            class_chunk("src/Outer.java", "Outer", 1, 100),
            class_chunk("src/Outer.java", "Inner", 20, 40),
            method_chunk("src/Outer.java", "innerWork", 25, 30),
            method_chunk("src/Outer.java", "outerWork", 50, 60),
        ])
        .await;

        assert_eq!(index.method("innerWork").unwrap().class_name, "Inner");
        assert_eq!(index.method("outerWork").unwrap().class_name, "Outer");
    }

    #[tokio::test]
    async fn test_class_metadata_is_applied() {
        let (index, _) = build(&[
            class_chunk("src/svc/UserService.java", "UserService", 1, 50)
                .with_metadata("superclass", json!("BaseService"))
                .with_metadata("interfaces", json!(["Auditable", "Auditable", "Closeable"]))
                .with_metadata("fields", json!(["repo: UserRepository"]))
                .with_metadata("modifiers", json!(["public", "abstract"]))
                .with_metadata("imports", json!(["com.acme.UserRepository"])),
            CodeChunk::new("src/svc/Repo.ts", ChunkKind::Interface, "Repo", 1, 9, "interface Repo {}")
                .with_metadata("extends", json!(["Reader", "Writer"])),
        ])
        .await;

        let service = index.class("UserService").unwrap();
        assert_eq!(service.class_type, ClassType::Abstract);
        assert_eq!(service.superclass.as_deref(), Some("BaseService"));
        assert_eq!(service.interfaces, vec!["Auditable", "Closeable"]);
        assert_eq!(service.package, "src/svc");
        assert_eq!(service.imports, vec!["com.acme.UserRepository"]);

        let repo = index.class("Repo").unwrap();
        assert!(repo.is_interface());
        assert_eq!(repo.interfaces, vec!["Reader", "Writer"]);
        assert!(repo.superclass.is_none());
    }

    #[tokio::test]
    async fn test_bare_chunk_does_not_replace_enriched_class() {
        let (index, _) = build(&[
            class_chunk("src/a/Widget.java", "Widget", 1, 10).with_metadata("superclass", json!("Base")),
            class_chunk("src/b/Widget.java", "Widget", 1, 10),
            class_chunk("src/a/Gadget.java", "Gadget", 1, 10),
            class_chunk("src/b/Gadget.java", "Gadget", 1, 10),
        ])
        .await;

        let widget = index.class("Widget").unwrap();
        assert_eq!(widget.file_path, "src/a/Widget.java");
        assert_eq!(widget.superclass.as_deref(), Some("Base"));
        // without metadata on either side, the last write wins
        assert_eq!(index.class("Gadget").unwrap().file_path, "src/b/Gadget.java");
    }

    #[tokio::test]
    async fn test_unsupported_files_and_malformed_files_skipped() {
        let (index, stats) = build(&[
            CodeChunk::new("docs/README.md", ChunkKind::Function, "readme", 1, 3, "# hi"),
            class_chunk("src/bad.py", "Broken", 1, 20),
            method_chunk("src/bad.py", "fine", 1, 3),
            method_chunk("src/bad.py", "", 4, 6),
            method_chunk("src/bad.py", "backwards", 9, 2),
            method_chunk("src/ok.py", "kept", 1, 3),
        ])
        .await;

        assert!(index.method("readme").is_none());
        // one malformed chunk rejects the whole file
        assert!(index.method("fine").is_none());
        assert!(index.class("Broken").is_none());
        assert!(index.method("kept").is_some());
        assert_eq!(index.method_count(), 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.chunks_skipped, 2);
    }

    #[tokio::test]
    async fn test_undecodable_row_fails_only_its_file() {
        let store = SqliteChunkStore::open_in_memory().unwrap();
        store
            .insert_chunks(&[
                method_chunk("src/a.ts", "lost", 1, 3),
                method_chunk("src/a.ts", "garbled", 5, 8),
                method_chunk("src/b.ts", "kept", 1, 3),
            ])
            .unwrap();
        store.corrupt_kind("garbled");

        let (index, stats) = IndexBuilder::build_from_store(&store).await.unwrap();
        assert!(index.method("lost").is_none());
        assert!(index.method("kept").is_some());
        assert_eq!(stats.files_failed, 1);
    }

    #[tokio::test]
    async fn test_backfill_called_by_and_subclasses() {
        let (index, _) = build(&[
            class_chunk("src/Base.java", "Base", 1, 30),
            class_chunk("src/Child.java", "Child", 1, 30).with_metadata("superclass", json!("Base")),
            method_chunk("src/Child.java", "login", 2, 10).with_dependencies(["validate", "log", "login"]),
            method_chunk("src/Child.java", "validate", 11, 20),
            method_chunk("src/Child.java", "submit", 21, 29).with_dependencies(["validate"]),
        ])
        .await;

        let validate = index.method("validate").unwrap();
        assert_eq!(validate.called_by, vec!["login", "submit"]);
        // self-recursion is not a caller
        assert!(index.method("login").unwrap().called_by.is_empty());
        assert_eq!(index.class("Base").unwrap().subclasses, vec!["Child"]);

        // the class's copy of the method sees the backfilled callers too
        let copy = index.class("Child").unwrap().methods.iter().find(|m| m.name == "validate").unwrap();
        assert_eq!(copy.called_by, vec!["login", "submit"]);
    }

    #[test]
    fn test_method_fields_from_chunk() {
        let chunk = method_chunk("src/Calc.java", "add", 3, 12)
            .with_signature("public int add(int a, int b)")
            .with_documentation("Adds two numbers")
            .with_dependencies(["check", "check", "sum"])
            .with_metadata("returnType", json!("int"))
            .with_metadata("complexity", json!(4));
        let method = method_from_chunk(&chunk, "Calc".to_string());

        assert_eq!(method.id, "src/Calc.java:add");
        assert_eq!(method.calls, vec!["check", "sum"]);
        assert_eq!(method.parameters, vec!["int a", "int b"]);
        assert_eq!(method.return_type.as_deref(), Some("int"));
        assert_eq!(method.complexity, 4);
        assert_eq!(method.lines_of_code, 10);
        assert_eq!(method.documentation.as_deref(), Some("Adds two numbers"));
    }

    /// Store that fails reads for one file
    struct FlakyStore {
        inner: SqliteChunkStore,
        broken: &'static str,
    }

    #[async_trait]
    impl ChunkStore for FlakyStore {
        async fn search_chunks(&self, query: &ChunkQuery) -> Result<Vec<CodeChunk>> {
            self.inner.search_chunks(query).await
        }

        async fn get_chunks_by_file(&self, file_path: &str) -> Result<Vec<CodeChunk>> {
            if file_path == self.broken {
                return Err(Error::Io(std::io::Error::other("disk on fire")));
            }
            self.inner.get_chunks_by_file(file_path).await
        }

        fn storage_path(&self) -> PathBuf {
            self.inner.storage_path()
        }
    }

    #[tokio::test]
    async fn test_failing_file_does_not_abort_build() {
        let inner = SqliteChunkStore::open_in_memory().unwrap();
        inner
            .insert_chunks(&[method_chunk("src/bad.ts", "lost", 1, 3), method_chunk("src/good.ts", "kept", 1, 3)])
            .unwrap();
        let store = FlakyStore { inner, broken: "src/bad.ts" };

        let (index, stats) = IndexBuilder::build_from_store(&store).await.unwrap();
        assert!(index.method("kept").is_some());
        assert!(index.method("lost").is_none());
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_indexed, 1);
    }
}
