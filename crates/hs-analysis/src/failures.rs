//! Failures aggregator: search, then trace every match on a bounded
//! worker pool, restoring search order in the result.

use crate::cancel::CancellationToken;
use crate::chain::build_chain;
use crate::compact::compact_error_with_context;
use crate::root_cause::resolve;
use crate::timeout::with_timeout;
use crate::AnalysisError;
use chrono::{DateTime, Utc};
use hs_core::config::AnalysisConfig;
use hs_core::execution::{ExecutionInfo, WorkflowStatus};
use hs_core::failures::{FailureEntry, FailureGroup, FailuresResult, GroupBy};
use hs_core::trace::{RootCause, RootCauseKind};
use hs_history::{AttributeFilter, HistorySource, SearchRequest, SearchSource};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Caller-side parameters of one failures search.
#[derive(Debug, Clone, Default)]
pub struct FailuresQuery {
    pub namespace: Option<String>,
    /// Statuses to search for. Empty = Failed and TimedOut.
    pub statuses: Vec<WorkflowStatus>,
    pub since: Option<DateTime<Utc>>,
    pub filters: Vec<AttributeFilter>,
    pub limit: Option<usize>,
    /// Case-insensitive substring the root-cause text must contain.
    pub error_contains: Option<String>,
    /// Drop entries whose root cause sits in a descendant.
    pub leaf_only: bool,
    pub compact_errors: bool,
    pub group_by: GroupBy,
}

impl FailuresQuery {
    pub fn search_request(&self) -> SearchRequest {
        let statuses = if self.statuses.is_empty() {
            vec![WorkflowStatus::Failed, WorkflowStatus::TimedOut]
        } else {
            self.statuses.clone()
        };
        SearchRequest {
            namespace: self.namespace.clone(),
            statuses,
            since: self.since,
            filters: self.filters.clone(),
            limit: self.limit,
        }
    }
}

/// Find failing executions and trace each one.
pub async fn find_failures(
    history: Arc<dyn HistorySource>,
    search: &dyn SearchSource,
    query: &FailuresQuery,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<FailuresResult, AnalysisError> {
    let request = query.search_request();
    let rendered = request.to_query_string();

    let matches = cancel
        .run(with_timeout(config.fetch_timeout_ms, search.search(&request)))
        .await?
        .map_err(|e| AnalysisError::Search(e.to_string()))?;

    // Dedupe by execution identity, keeping search order.
    let mut seen = HashSet::new();
    let matches: Vec<ExecutionInfo> = matches
        .into_iter()
        .filter(|m| seen.insert(m.execution.clone()))
        .collect();
    tracing::debug!(query = %rendered, matches = matches.len(), "search complete");

    let mut entries = trace_all(history, matches, config, cancel).await?;

    if let Some(needle) = query.error_contains.as_deref().map(str::to_lowercase) {
        entries.retain(|e| {
            e.root_cause
                .as_ref()
                .is_some_and(|rc| rc.summary().to_lowercase().contains(&needle))
        });
    }
    if query.leaf_only {
        entries.retain(|e| match &e.root_cause {
            Some(rc) => rc
                .workflow
                .as_ref()
                .map_or(true, |wf| wf.same_workflow(&e.root_workflow)),
            None => true,
        });
    }
    if query.compact_errors || config.compact_errors {
        for entry in &mut entries {
            if let Some(rc) = entry.root_cause.as_mut() {
                rc.error = compact_error_with_context(&rc.error);
            }
        }
    }

    let total_count = entries.len();
    if query.group_by == GroupBy::None {
        return Ok(FailuresResult {
            failures: entries,
            groups: Vec::new(),
            total_count,
            query: rendered,
            grouped_by: None,
        });
    }
    Ok(FailuresResult {
        failures: Vec::new(),
        groups: group(&entries, query.group_by),
        total_count,
        query: rendered,
        grouped_by: Some(query.group_by),
    })
}

/// Trace every match on `min(workers, n)` tasks. Each task claims the next
/// index from a shared cursor; results come back tagged with their index and
/// land in the slot of that index. The tasks live in a `JoinSet`, so they are
/// aborted when this future is dropped.
async fn trace_all(
    history: Arc<dyn HistorySource>,
    matches: Vec<ExecutionInfo>,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Vec<FailureEntry>, AnalysisError> {
    if matches.is_empty() {
        return Ok(Vec::new());
    }
    let matches: Arc<[ExecutionInfo]> = matches.into();
    let cursor = Arc::new(AtomicUsize::new(0));
    let workers = config.workers.max(1).min(matches.len());

    let mut tasks = JoinSet::new();
    for _ in 0..workers {
        let history = Arc::clone(&history);
        let matches = Arc::clone(&matches);
        let cursor = Arc::clone(&cursor);
        let config = config.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let mut done = Vec::new();
            loop {
                let i = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(info) = matches.get(i) else {
                    break;
                };
                let entry = trace_one(history.as_ref(), info, &config, &cancel).await?;
                done.push((i, entry));
            }
            Ok::<_, AnalysisError>(done)
        });
    }

    let mut slots: Vec<Option<FailureEntry>> = vec![None; matches.len()];
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(AnalysisError::Fetch(format!("worker failed: {e}"))),
        };
        match outcome {
            Ok(done) => {
                for (i, entry) in done {
                    slots[i] = Some(entry);
                }
            }
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Chain + root cause for one match. Only cancellation is fatal here; any
/// other error becomes an `Unknown` root cause on the entry.
async fn trace_one(
    history: &dyn HistorySource,
    info: &ExecutionInfo,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<FailureEntry, AnalysisError> {
    let (chain, root_cause) = match build_chain(history, &info.execution, config, cancel).await {
        Ok(chain) => {
            let rc = resolve(&chain);
            (chain, rc)
        }
        Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
        Err(e) => {
            tracing::warn!(execution = %info.execution, error = %e, "failed to trace");
            let rc = RootCause {
                kind: RootCauseKind::Unknown,
                error: format!("failed to trace: {e}"),
                activity: None,
                timestamp: None,
                workflow: None,
            };
            (Vec::new(), Some(rc))
        }
    };

    Ok(FailureEntry {
        root_workflow: info.execution.clone(),
        workflow_type: info
            .workflow_type
            .clone()
            .or_else(|| chain.first().and_then(|n| n.workflow_type.clone())),
        status: info.status.as_str().to_string(),
        close_time: info.close_time,
        depth: chain.iter().map(|n| n.depth).max().unwrap_or(0),
        leaf_failure: root_cause.as_ref().and_then(|rc| rc.workflow.clone()),
        root_cause,
        chain,
    })
}

fn group_key(entry: &FailureEntry, by: GroupBy) -> String {
    match by {
        GroupBy::Type => entry
            .workflow_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        GroupBy::Namespace => entry.root_workflow.namespace.clone(),
        GroupBy::Status => entry.status.clone(),
        GroupBy::Error => entry
            .root_cause
            .as_ref()
            .map(|rc| crate::compact::compact_error(&rc.error))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        GroupBy::None => String::new(),
    }
}

/// Groups sorted by count descending, then key.
fn group(entries: &[FailureEntry], by: GroupBy) -> Vec<FailureGroup> {
    let mut groups: BTreeMap<String, FailureGroup> = BTreeMap::new();
    for entry in entries {
        let key = group_key(entry, by);
        let g = groups.entry(key.clone()).or_insert_with(|| FailureGroup {
            key,
            count: 0,
            percentage: 0.0,
            sample: Some(entry.clone()),
            first_seen: None,
            last_seen: None,
        });
        g.count += 1;
        if let Some(t) = entry.close_time {
            g.first_seen = Some(g.first_seen.map_or(t, |f| f.min(t)));
            g.last_seen = Some(g.last_seen.map_or(t, |l| l.max(t)));
        }
    }

    let total = entries.len().max(1) as f64;
    let mut out: Vec<FailureGroup> = groups
        .into_values()
        .map(|mut g| {
            g.percentage = g.count as f64 * 100.0 / total;
            g
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    out
}
