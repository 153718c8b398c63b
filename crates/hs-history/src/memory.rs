//! In-memory history and search source, plus a fixture builder for histories.

use crate::{HistoryError, HistorySource, SearchRequest, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hs_core::event::{EventKind, History, RawEvent};
use hs_core::execution::{ExecutionInfo, ExecutionRef};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type WorkflowKey = (String, String);

fn key_of(execution: &ExecutionRef) -> WorkflowKey {
    (execution.namespace.clone(), execution.workflow_id.clone())
}

#[derive(Debug, Default)]
struct Inner {
    /// Runs per workflow, in insertion order (last = latest).
    runs: HashMap<WorkflowKey, Vec<History>>,
    /// Visibility rows in insertion order.
    rows: Vec<ExecutionInfo>,
    unavailable: HashSet<WorkflowKey>,
}

/// History + search source backed by plain maps.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    inner: RwLock<Inner>,
    fetches: AtomicUsize,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoned guards are recovered; an insert is never dropped.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a history. Its visibility row is derived from its milestones.
    pub fn insert(&self, history: History) {
        self.insert_with_attributes(history, std::iter::empty::<(String, String)>());
    }

    /// Add a history with extra search attributes on its visibility row.
    pub fn insert_with_attributes<I, K, V>(&self, history: History, attributes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut info = history.execution_info();
        for (k, v) in attributes {
            info.search_attributes.insert(k.into(), v.into());
        }
        let mut inner = self.write();
        inner.rows.push(info);
        inner
            .runs
            .entry(key_of(&history.execution))
            .or_default()
            .push(history);
    }

    /// Make every fetch of this workflow fail with a transient error.
    pub fn mark_unavailable(&self, execution: &ExecutionRef) {
        self.write().unavailable.insert(key_of(execution));
    }

    /// Number of `fetch_history` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HistorySource for InMemoryHistory {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<History, HistoryError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let inner = self.read();
        let key = key_of(execution);
        if inner.unavailable.contains(&key) {
            return Err(HistoryError::Transient(format!(
                "history unavailable for {execution}"
            )));
        }
        let runs = inner
            .runs
            .get(&key)
            .ok_or_else(|| HistoryError::NotFound(execution.to_string()))?;
        let found = match &execution.run_id {
            Some(run) => runs
                .iter()
                .find(|h| h.execution.run_id.as_deref() == Some(run.as_str())),
            None => runs.last(),
        };
        found
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(execution.to_string()))
    }
}

#[async_trait]
impl SearchSource for InMemoryHistory {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ExecutionInfo>, HistoryError> {
        let inner = self.read();
        let limit = request.limit.unwrap_or(usize::MAX);
        Ok(inner
            .rows
            .iter()
            .filter(|row| request.matches(row))
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// HistoryBuilder: fixture histories with sequential IDs and a synthetic clock
// ---------------------------------------------------------------------------

/// Builds a history event by event. Every event advances the clock by one
/// second; sequence IDs start at 1.
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    execution: ExecutionRef,
    events: Vec<RawEvent>,
    clock: DateTime<Utc>,
}

impl HistoryBuilder {
    pub fn new(execution: ExecutionRef) -> Self {
        let clock = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            execution,
            events: Vec::new(),
            clock,
        }
    }

    /// Start the synthetic clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.clock = start;
        self
    }

    pub fn advance(&mut self, millis: i64) -> &mut Self {
        self.clock += Duration::milliseconds(millis);
        self
    }

    /// Append a raw event of any kind and return its sequence ID.
    pub fn event(&mut self, kind: &str, attributes: serde_json::Value) -> i64 {
        let sequence_id = self.events.len() as i64 + 1;
        self.clock += Duration::seconds(1);
        self.events.push(RawEvent {
            sequence_id,
            kind: kind.to_string(),
            timestamp: self.clock,
            attributes,
        });
        sequence_id
    }

    fn push(&mut self, kind: EventKind, attributes: serde_json::Value) -> i64 {
        self.event(kind.name(), attributes)
    }

    pub fn workflow_started(&mut self, workflow_type: &str) -> i64 {
        self.push(
            EventKind::WorkflowExecutionStarted,
            json!({ "workflow_type": workflow_type }),
        )
    }

    pub fn workflow_completed(&mut self) -> i64 {
        self.push(EventKind::WorkflowExecutionCompleted, json!({}))
    }

    pub fn workflow_failed(&mut self, message: &str) -> i64 {
        self.push(
            EventKind::WorkflowExecutionFailed,
            json!({ "failure": { "message": message } }),
        )
    }

    pub fn workflow_timed_out(&mut self) -> i64 {
        self.push(EventKind::WorkflowExecutionTimedOut, json!({}))
    }

    pub fn workflow_canceled(&mut self) -> i64 {
        self.push(EventKind::WorkflowExecutionCanceled, json!({}))
    }

    pub fn workflow_terminated(&mut self, reason: &str) -> i64 {
        self.push(
            EventKind::WorkflowExecutionTerminated,
            json!({ "reason": reason }),
        )
    }

    pub fn activity_scheduled(&mut self, activity_type: &str, activity_id: &str) -> i64 {
        self.push(
            EventKind::ActivityTaskScheduled,
            json!({ "activity_type": activity_type, "activity_id": activity_id }),
        )
    }

    pub fn activity_started(&mut self, scheduled: i64, attempt: i64) -> i64 {
        self.push(
            EventKind::ActivityTaskStarted,
            json!({ "initiating_sequence_id": scheduled, "attempt": attempt }),
        )
    }

    pub fn activity_completed(&mut self, scheduled: i64) -> i64 {
        self.push(
            EventKind::ActivityTaskCompleted,
            json!({ "initiating_sequence_id": scheduled }),
        )
    }

    pub fn activity_failed(&mut self, scheduled: i64, message: &str) -> i64 {
        self.push(
            EventKind::ActivityTaskFailed,
            json!({
                "initiating_sequence_id": scheduled,
                "failure": { "type": "ApplicationError", "message": message },
            }),
        )
    }

    pub fn activity_timed_out(&mut self, scheduled: i64) -> i64 {
        self.push(
            EventKind::ActivityTaskTimedOut,
            json!({ "initiating_sequence_id": scheduled }),
        )
    }

    pub fn timer_started(&mut self, timer_id: &str) -> i64 {
        self.push(EventKind::TimerStarted, json!({ "timer_id": timer_id }))
    }

    pub fn timer_fired(&mut self, started: i64) -> i64 {
        self.push(
            EventKind::TimerFired,
            json!({ "initiating_sequence_id": started }),
        )
    }

    pub fn child_initiated(&mut self, child: &ExecutionRef, workflow_type: &str) -> i64 {
        self.push(
            EventKind::StartChildWorkflowExecutionInitiated,
            json!({
                "namespace": child.namespace,
                "workflow_id": child.workflow_id,
                "workflow_type": workflow_type,
            }),
        )
    }

    pub fn child_started(&mut self, initiated: i64, run_id: &str) -> i64 {
        self.push(
            EventKind::ChildWorkflowExecutionStarted,
            json!({ "initiating_sequence_id": initiated, "run_id": run_id }),
        )
    }

    pub fn child_completed(&mut self, initiated: i64) -> i64 {
        self.push(
            EventKind::ChildWorkflowExecutionCompleted,
            json!({ "initiating_sequence_id": initiated }),
        )
    }

    pub fn child_failed(&mut self, initiated: i64, message: &str) -> i64 {
        self.push(
            EventKind::ChildWorkflowExecutionFailed,
            json!({
                "initiating_sequence_id": initiated,
                "failure": { "type": "ChildWorkflowExecutionError", "message": message },
            }),
        )
    }

    pub fn signal(&mut self, signal_name: &str) -> i64 {
        self.push(
            EventKind::WorkflowExecutionSignaled,
            json!({ "signal_name": signal_name }),
        )
    }

    pub fn build(self) -> History {
        History {
            execution: self.execution,
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::execution::WorkflowStatus;

    fn failed_run(workflow_id: &str, run: &str) -> History {
        let mut b = HistoryBuilder::new(ExecutionRef::new("default", workflow_id).with_run(run));
        b.workflow_started("OrderWorkflow");
        b.workflow_failed("boom");
        b.build()
    }

    #[tokio::test]
    async fn fetch_resolves_latest_run() {
        let source = InMemoryHistory::new();
        source.insert(failed_run("order-1", "r1"));
        source.insert(failed_run("order-1", "r2"));

        let latest = source
            .fetch_history(&ExecutionRef::new("default", "order-1"))
            .await
            .unwrap();
        assert_eq!(latest.execution.run_id.as_deref(), Some("r2"));

        let pinned = source
            .fetch_history(&ExecutionRef::new("default", "order-1").with_run("r1"))
            .await
            .unwrap();
        assert_eq!(pinned.execution.run_id.as_deref(), Some("r1"));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn insert_survives_a_poisoned_lock() {
        let source = std::sync::Arc::new(InMemoryHistory::new());
        let poisoner = std::sync::Arc::clone(&source);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("poison the fixture lock");
        })
        .join();
        assert!(source.inner.is_poisoned());

        source.insert(failed_run("order-1", "r1"));
        source.mark_unavailable(&ExecutionRef::new("default", "order-2"));
        let history = source
            .fetch_history(&ExecutionRef::new("default", "order-1"))
            .await
            .unwrap();
        assert_eq!(history.execution.run_id.as_deref(), Some("r1"));
        assert!(matches!(
            source
                .fetch_history(&ExecutionRef::new("default", "order-2"))
                .await,
            Err(HistoryError::Transient(_))
        ));
        assert_eq!(source.search(&SearchRequest::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_and_unavailable() {
        let source = InMemoryHistory::new();
        source.insert(failed_run("order-1", "r1"));

        let missing = source
            .fetch_history(&ExecutionRef::new("default", "nope"))
            .await;
        assert!(matches!(missing, Err(HistoryError::NotFound(_))));

        source.mark_unavailable(&ExecutionRef::new("default", "order-1"));
        let down = source
            .fetch_history(&ExecutionRef::new("default", "order-1"))
            .await;
        assert!(matches!(down, Err(HistoryError::Transient(_))));
    }

    #[tokio::test]
    async fn search_applies_predicate_and_limit() {
        let source = InMemoryHistory::new();
        source.insert(failed_run("a", "r1"));
        source.insert(failed_run("b", "r1"));
        let mut ok = HistoryBuilder::new(ExecutionRef::new("default", "c").with_run("r1"));
        ok.workflow_started("OrderWorkflow");
        ok.workflow_completed();
        source.insert(ok.build());

        let failed = SearchRequest {
            statuses: vec![WorkflowStatus::Failed],
            ..Default::default()
        };
        let rows = source.search(&failed).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].execution.workflow_id, "a");
        assert_eq!(rows[0].workflow_type.as_deref(), Some("OrderWorkflow"));

        let limited = SearchRequest {
            limit: Some(1),
            ..failed
        };
        assert_eq!(source.search(&limited).await.unwrap().len(), 1);
    }

    #[test]
    fn builder_assigns_sequential_ids() {
        let mut b = HistoryBuilder::new(ExecutionRef::new("default", "x"));
        let start = b.workflow_started("W");
        let act = b.activity_scheduled("Charge", "1");
        b.activity_started(act, 1);
        let history = b.build();
        assert_eq!(start, 1);
        assert_eq!(act, 2);
        assert_eq!(history.events.len(), 3);
        assert!(history.events[0].timestamp < history.events[2].timestamp);
    }
}
