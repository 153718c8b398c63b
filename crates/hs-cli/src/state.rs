//! Process-wide state: the history database and the analysis config.

use anyhow::Context;
use hs_analysis::Analyzer;
use hs_core::config::AnalysisConfig;
use hs_history::store::HistoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppState {
    /// History store (SQLite).
    pub store: Arc<HistoryStore>,

    /// Config as loaded, before per-command overrides.
    pub config: AnalysisConfig,
}

impl AppState {
    pub fn open(db: Option<PathBuf>, config: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config.or_else(|| dirs::config_dir().map(|d| d.join("histscope").join("config.json")));
        let config = match &config_path {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };

        let db_path = db.unwrap_or_else(default_db_path);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = HistoryStore::open(&db_path)
            .with_context(|| format!("opening history database {}", db_path.display()))?;
        tracing::debug!(db = %db_path.display(), "history store opened");

        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    /// Analyzer over the store with `config` in place of the loaded one.
    pub fn analyzer(&self, config: AnalysisConfig) -> Analyzer {
        Analyzer::from_source(Arc::clone(&self.store), config)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("histscope"))
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join("history.db")
}
