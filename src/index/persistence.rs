//! Index snapshots
//!
//! Each index is written as a JSON list of `(name, node)` pairs. Writes
//! overwrite in place; a torn or corrupt file is detected at load time and
//! treated as a cache miss.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::Result;
use crate::model::{ClassNode, MethodNode};
use super::CodeIndex;

pub const DEFAULT_METHOD_INDEX_FILE: &str = "method-index.json";
pub const DEFAULT_CLASS_INDEX_FILE: &str = "class-index.json";

/// Locations of the two snapshot files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub method_index: PathBuf,
    pub class_index: PathBuf,
}

impl SnapshotPaths {
    pub fn new(dir: &Path, method_file: &str, class_file: &str) -> Self {
        Self {
            method_index: dir.join(method_file),
            class_index: dir.join(class_file),
        }
    }

    /// Default file names under a directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir, DEFAULT_METHOD_INDEX_FILE, DEFAULT_CLASS_INDEX_FILE)
    }
}

/// Write both indices, creating the directory if needed
pub async fn save_indexes(index: &CodeIndex, paths: &SnapshotPaths) -> Result<()> {
    write_entries(&paths.method_index, index.methods()).await?;
    write_entries(&paths.class_index, index.classes()).await?;
    tracing::debug!(
        "Saved index snapshot ({} methods, {} classes)",
        index.method_count(),
        index.class_count()
    );
    Ok(())
}

/// Load both indices.
///
/// Returns `None` unless both files exist and decode to non-empty maps.
/// Read and parse failures are logged, never propagated.
pub async fn load_indexes(paths: &SnapshotPaths) -> Option<CodeIndex> {
    let methods: BTreeMap<String, MethodNode> = read_entries(&paths.method_index).await?;
    let classes: BTreeMap<String, ClassNode> = read_entries(&paths.class_index).await?;

    if methods.is_empty() || classes.is_empty() {
        tracing::debug!("Index snapshot is empty; rebuilding");
        return None;
    }

    Some(CodeIndex::from_parts(methods, classes))
}

/// Remove both snapshot files, ignoring ones that are already gone
pub async fn clear_indexes(paths: &SnapshotPaths) -> Result<()> {
    for path in [&paths.method_index, &paths.class_index] {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn write_entries<T: Serialize>(path: &Path, map: &BTreeMap<String, T>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let entries: Vec<(&String, &T)> = map.iter().collect();
    let bytes = serde_json::to_vec(&entries)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

async fn read_entries<T: DeserializeOwned>(path: &Path) -> Option<BTreeMap<String, T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read index snapshot {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<Vec<(String, T)>>(&bytes) {
        Ok(entries) => Some(entries.into_iter().collect()),
        Err(e) => {
            tracing::warn!("Ignoring corrupt index snapshot {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassType;

    fn sample_index() -> CodeIndex {
        let mut login = MethodNode::new("src/Auth.java", "Auth", "login", 3, 12).with_calls(["validate"]);
        login.parameters = vec!["String user".to_string()];
        login.return_type = Some("boolean".to_string());
        let mut validate = MethodNode::new("src/Auth.java", "Auth", "validate", 14, 20);
        validate.called_by = vec!["login".to_string()];

        let mut auth = ClassNode::new("src/Auth.java", "Auth", ClassType::Class).implementing(["Service"]);
        auth.methods = vec![login.clone(), validate.clone()];
        let service = ClassNode::new("src/Service.java", "Service", ClassType::Interface);

        let methods = BTreeMap::from([("login".to_string(), login), ("validate".to_string(), validate)]);
        let classes = BTreeMap::from([("Auth".to_string(), auth), ("Service".to_string(), service)]);
        CodeIndex::from_parts(methods, classes)
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(&dir.path().join("nested"));
        let index = sample_index();

        save_indexes(&index, &paths).await.unwrap();
        let loaded = load_indexes(&paths).await.unwrap();

        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path());

        assert!(load_indexes(&paths).await.is_none());

        save_indexes(&sample_index(), &paths).await.unwrap();
        tokio::fs::remove_file(&paths.class_index).await.unwrap();
        assert!(load_indexes(&paths).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path());
        save_indexes(&sample_index(), &paths).await.unwrap();

        // simulate a write torn mid-way
        tokio::fs::write(&paths.method_index, b"[[\"login\", {\"id\":").await.unwrap();
        assert!(load_indexes(&paths).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path());
        save_indexes(&CodeIndex::default(), &paths).await.unwrap();

        assert!(paths.method_index.exists());
        assert!(load_indexes(&paths).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path());
        save_indexes(&sample_index(), &paths).await.unwrap();

        clear_indexes(&paths).await.unwrap();
        assert!(!paths.method_index.exists());
        // clearing twice is fine
        clear_indexes(&paths).await.unwrap();
    }
}
