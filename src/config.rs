use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::analysis::call_graph::DEFAULT_MAX_DEPTH;
use crate::analysis::HotspotThresholds;
use crate::index::SnapshotPaths;
use crate::index::persistence::{DEFAULT_CLASS_INDEX_FILE, DEFAULT_METHOD_INDEX_FILE};

pub const DEFAULT_SEMANTIC_TOP_K: usize = 5;

/// Contents of `codexref.toml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CodexrefConfig {
    pub database: Option<String>,
    pub storage_path: Option<String>,
    pub max_depth: Option<usize>,
    pub semantic_top_k: Option<usize>,
    pub method_index_file: Option<String>,
    pub class_index_file: Option<String>,
    pub hotspots: Option<HotspotThresholds>,
}

impl CodexrefConfig {
    /// The config `init` writes: every default spelled out
    pub fn with_defaults() -> Self {
        Self {
            database: Some(default_database_path_in(Path::new(".")).display().to_string()),
            storage_path: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            semantic_top_k: Some(DEFAULT_SEMANTIC_TOP_K),
            method_index_file: Some(DEFAULT_METHOD_INDEX_FILE.to_string()),
            class_index_file: Some(DEFAULT_CLASS_INDEX_FILE.to_string()),
            hotspots: Some(HotspotThresholds::default()),
        }
    }
}

/// Resolved settings the analyzer runs with
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    /// Snapshot directory; the store's storage path when unset
    pub storage_path: Option<PathBuf>,
    pub max_depth: usize,
    pub semantic_top_k: usize,
    pub method_index_file: String,
    pub class_index_file: String,
    pub hotspots: HotspotThresholds,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            storage_path: None,
            max_depth: DEFAULT_MAX_DEPTH,
            semantic_top_k: DEFAULT_SEMANTIC_TOP_K,
            method_index_file: DEFAULT_METHOD_INDEX_FILE.to_string(),
            class_index_file: DEFAULT_CLASS_INDEX_FILE.to_string(),
            hotspots: HotspotThresholds::default(),
        }
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &CodexrefConfig) -> Self {
        let defaults = Self::default();
        Self {
            storage_path: config.storage_path.as_ref().map(PathBuf::from),
            max_depth: config.max_depth.unwrap_or(defaults.max_depth),
            semantic_top_k: config.semantic_top_k.unwrap_or(defaults.semantic_top_k),
            method_index_file: config.method_index_file.clone().unwrap_or(defaults.method_index_file),
            class_index_file: config.class_index_file.clone().unwrap_or(defaults.class_index_file),
            hotspots: config.hotspots.unwrap_or(defaults.hotspots),
        }
    }

    /// Snapshot file locations, falling back to the store's directory
    pub fn snapshot_paths(&self, store_dir: &Path) -> SnapshotPaths {
        let dir = self.storage_path.as_deref().unwrap_or(store_dir);
        SnapshotPaths::new(dir, &self.method_index_file, &self.class_index_file)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("codexref.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".codexref").join("chunks.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<CodexrefConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CodexrefConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &CodexrefConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(dir.path().join("codexref.toml").as_path())).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codexref.toml");
        std::fs::write(&path, "max_depth = 3\n\n[hotspots]\nmax_methods = 25\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap().unwrap();
        let settings = AnalyzerSettings::from_config(&config);

        assert_eq!(settings.max_depth, 3);
        assert_eq!(settings.semantic_top_k, DEFAULT_SEMANTIC_TOP_K);
        assert_eq!(settings.hotspots.max_methods, 25);
        assert_eq!(settings.hotspots.max_coupling, 5);
        assert_eq!(settings.method_index_file, "method-index.json");
    }

    #[test]
    fn test_write_config_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codexref.toml");
        let config = CodexrefConfig::with_defaults();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let reloaded = load_config(Some(path.as_path())).unwrap().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_snapshot_paths_prefer_configured_dir() {
        let mut settings = AnalyzerSettings::default();
        let paths = settings.snapshot_paths(Path::new("/data/store"));
        assert_eq!(paths.method_index, Path::new("/data/store/method-index.json"));

        settings.storage_path = Some(PathBuf::from("/tmp/snap"));
        let paths = settings.snapshot_paths(Path::new("/data/store"));
        assert_eq!(paths.class_index, Path::new("/tmp/snap/class-index.json"));
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = default_database_path_in(dir.path());
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
