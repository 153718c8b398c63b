//! Analysis configuration: traversal bounds, worker pool size, folding policy.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Deepest node depth the chain walker may visit (0 = root only).
    pub max_depth: u32,

    /// Maximum nodes in one chain.
    pub max_nodes: usize,

    /// Parallel chain builds in the failures aggregator.
    pub workers: usize,

    /// Keep every activity attempt instead of folding retries into the latest.
    pub per_attempt: bool,

    /// Namespaces the chain walker may enter. Empty = all.
    pub follow_namespaces: Vec<String>,

    /// Strip wrapper context from error messages in failure reports.
    pub compact_errors: bool,

    /// Per-fetch deadline in milliseconds; exceeding it is a transient error.
    pub fetch_timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_nodes: 256,
            workers: 8,
            per_attempt: false,
            follow_namespaces: Vec::new(),
            compact_errors: false,
            fetch_timeout_ms: 30_000,
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.workers = config.workers.max(1);
        config.max_nodes = config.max_nodes.max(1);
        Ok(config)
    }

    /// Whether the chain walker may enter `namespace`. `root_namespace` is
    /// always allowed.
    pub fn can_follow(&self, namespace: &str, root_namespace: &str) -> bool {
        self.follow_namespaces.is_empty()
            || namespace == root_namespace
            || self.follow_namespaces.iter().any(|ns| ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"max_depth": 3, "per_attempt": true}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert!(config.per_attempt);
        assert_eq!(config.workers, 8);
        assert_eq!(config.fetch_timeout_ms, 30_000);
    }

    #[test]
    fn missing_file_is_default() {
        let config = AnalysisConfig::load(Path::new("/nonexistent/histscope.json")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn load_clamps_zero_limits() {
        let path = std::env::temp_dir().join(format!("histscope-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"max_nodes": 0, "workers": 0}"#).unwrap();
        let config = AnalysisConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.max_nodes, 1);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn follow_policy() {
        let mut config = AnalysisConfig::default();
        assert!(config.can_follow("billing", "default"));
        config.follow_namespaces = vec!["billing".into()];
        assert!(config.can_follow("billing", "default"));
        assert!(config.can_follow("default", "default"));
        assert!(!config.can_follow("shipping", "default"));
    }
}
