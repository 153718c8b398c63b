//! hs-analysis: timelines, failure chains and failures aggregation over a
//! history source.

pub mod cancel;
pub mod chain;
pub mod classifier;
pub mod compact;
pub mod correlator;
pub mod failures;
pub mod mermaid;
pub mod render;
pub mod root_cause;
pub mod timeline;
pub mod timeout;

use hs_core::config::AnalysisConfig;
use hs_core::execution::ExecutionRef;
use hs_core::failures::FailuresResult;
use hs_core::timeline::TimelineResult;
use hs_core::trace::TraceResult;
use hs_history::{HistoryError, HistorySource, SearchSource};
use std::sync::Arc;
use thiserror::Error;

pub use cancel::CancellationToken;
pub use failures::FailuresQuery;
pub use render::{render, OutputFormat, Render};
pub use timeline::TimelineOptions;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("execution not found: {0}")]
    NotFound(String),
    #[error("history fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("cancelled")]
    Cancelled,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<HistoryError> for AnalysisError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::NotFound(what) => AnalysisError::NotFound(what),
            HistoryError::InvalidQuery(msg) => AnalysisError::InvalidQuery(msg),
            other => AnalysisError::Fetch(other.to_string()),
        }
    }
}

/// Entry point for the three analyses over one pair of sources.
#[derive(Clone)]
pub struct Analyzer {
    history: Arc<dyn HistorySource>,
    search: Arc<dyn SearchSource>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(
        history: Arc<dyn HistorySource>,
        search: Arc<dyn SearchSource>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            history,
            search,
            config,
        }
    }

    /// Analyzer whose history and search come from the same source.
    pub fn from_source<S>(source: Arc<S>, config: AnalysisConfig) -> Self
    where
        S: HistorySource + SearchSource + 'static,
    {
        Self::new(source.clone(), source, config)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Fetch one history and project it into a timeline.
    pub async fn timeline(
        &self,
        execution: &ExecutionRef,
        options: &TimelineOptions,
        cancel: &CancellationToken,
    ) -> Result<TimelineResult, AnalysisError> {
        tracing::info!(execution = %execution, compact = options.compact, "building timeline");
        let history = cancel
            .run(timeout::with_timeout(
                self.config.fetch_timeout_ms,
                self.history.fetch_history(execution),
            ))
            .await??;
        let result = timeline::build_timeline(&history, options);
        tracing::info!(execution = %history.execution, events = result.events.len(), status = %result.status, "timeline built");
        Ok(result)
    }

    /// Walk the chain from `execution` and resolve its root cause.
    pub async fn trace(
        &self,
        execution: &ExecutionRef,
        cancel: &CancellationToken,
    ) -> Result<TraceResult, AnalysisError> {
        tracing::info!(execution = %execution, max_depth = self.config.max_depth, "tracing chain");
        let chain = chain::build_chain(self.history.as_ref(), execution, &self.config, cancel).await?;
        let root_cause = root_cause::resolve(&chain);
        let depth = chain.iter().map(|n| n.depth).max().unwrap_or(0);
        tracing::info!(
            execution = %execution,
            nodes = chain.len(),
            root_cause = root_cause.as_ref().map(|rc| rc.kind.as_str()).unwrap_or("none"),
            "trace complete"
        );
        Ok(TraceResult {
            chain,
            root_cause,
            depth,
        })
    }

    /// Search for failing executions and trace each one.
    pub async fn failures(
        &self,
        query: &FailuresQuery,
        cancel: &CancellationToken,
    ) -> Result<FailuresResult, AnalysisError> {
        tracing::info!(workers = self.config.workers, "finding failures");
        let result = failures::find_failures(
            Arc::clone(&self.history),
            self.search.as_ref(),
            query,
            &self.config,
            cancel,
        )
        .await?;
        tracing::info!(total = result.total_count, "failures complete");
        Ok(result)
    }
}
