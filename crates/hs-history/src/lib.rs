//! hs-history: History and search sources consumed by the analysis engine.
//!
//! Pagination, retry and auth against a remote service are the source's
//! concern; callers see one call that returns the full list or an error.

pub mod export;
pub mod memory;
pub mod query;
pub mod store;

use async_trait::async_trait;
use hs_core::event::History;
use hs_core::execution::{ExecutionInfo, ExecutionRef};
use thiserror::Error;

pub use query::{AttributeFilter, SearchRequest};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("execution not found: {0}")]
    NotFound(String),
    #[error("transient fetch error: {0}")]
    Transient(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("malformed history: {0}")]
    Malformed(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Fetches the full, sequence-ordered history of one execution.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<History, HistoryError>;
}

/// Lists executions matching a visibility predicate, in source order.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ExecutionInfo>, HistoryError>;
}
