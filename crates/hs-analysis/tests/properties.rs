//! End-to-end behaviour of the analysis engine over fixture histories.

use chrono::{TimeZone, Utc};
use hs_analysis::correlator::correlate;
use hs_analysis::{Analyzer, CancellationToken, FailuresQuery, TimelineOptions};
use hs_core::config::AnalysisConfig;
use hs_core::execution::ExecutionRef;
use hs_core::lifecycle::{Category, LifecycleStatus};
use hs_core::trace::RootCauseKind;
use hs_history::memory::{HistoryBuilder, InMemoryHistory};
use hs_history::store::HistoryStore;
use hs_history::AttributeFilter;
use std::collections::HashSet;
use std::sync::Arc;

fn exec(id: &str) -> ExecutionRef {
    ExecutionRef::new("default", id)
}

fn analyzer(source: Arc<InMemoryHistory>) -> Analyzer {
    Analyzer::from_source(source, AnalysisConfig::default())
}

fn compact() -> TimelineOptions {
    TimelineOptions {
        compact: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn start_complete_history_has_two_workflow_events() {
    let source = Arc::new(InMemoryHistory::new());
    let mut b = HistoryBuilder::new(exec("simple").with_run("r1"));
    b.workflow_started("SimpleWorkflow");
    b.workflow_completed();
    source.insert(b.build());

    let tl = analyzer(source)
        .timeline(&exec("simple"), &TimelineOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(tl.events.len(), 2);
    assert!(tl.events.iter().all(|e| e.category == Category::Workflow));
    assert_eq!(tl.status, "Completed");
}

#[tokio::test]
async fn activity_triplet_is_one_record_and_two_compact_rows() {
    let source = Arc::new(InMemoryHistory::new());
    let mut b = HistoryBuilder::new(exec("order").with_run("r1"));
    b.workflow_started("OrderWorkflow");
    let act = b.activity_scheduled("Charge", "1");
    b.activity_started(act, 1);
    b.activity_completed(act);
    b.workflow_completed();
    let history = b.build();

    let correlation = correlate(&history.events, false);
    assert_eq!(correlation.records.len(), 1);
    let record = correlation.records.values().next().unwrap();
    assert_eq!(record.category, Category::Activity);
    assert_eq!(record.status, LifecycleStatus::Completed);

    source.insert(history);
    let tl = analyzer(source)
        .timeline(&exec("order"), &compact(), &CancellationToken::new())
        .await
        .unwrap();
    let activity: Vec<&str> = tl
        .events
        .iter()
        .filter(|e| e.category == Category::Activity)
        .filter_map(|e| e.status.as_deref())
        .collect();
    assert_eq!(activity, vec!["scheduled", "completed"]);
}

#[tokio::test]
async fn two_level_chain_blames_the_child() {
    let source = Arc::new(InMemoryHistory::new());
    let mut parent = HistoryBuilder::new(exec("order").with_run("p1"));
    parent.workflow_started("OrderWorkflow");
    let init = parent.child_initiated(&exec("payment"), "PaymentWorkflow");
    parent.child_started(init, "c1");
    parent.child_failed(init, "child workflow execution error");
    parent.workflow_failed("order failed: child workflow execution error");
    source.insert(parent.build());

    let mut child = HistoryBuilder::new(exec("payment").with_run("c1"));
    child.workflow_started("PaymentWorkflow");
    child.workflow_failed("insufficient funds");
    source.insert(child.build());

    let trace = analyzer(source)
        .trace(&exec("order"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(trace.chain.len(), 2);
    assert_eq!(trace.chain[0].depth, 0);
    assert!(!trace.chain[0].is_leaf);
    assert_eq!(trace.chain[0].status.as_str(), "Failed");
    assert_eq!(trace.chain[1].depth, 1);
    assert!(trace.chain[1].is_leaf);
    assert_eq!(trace.chain[1].status.as_str(), "Failed");

    let rc = trace.root_cause.unwrap();
    assert!(rc.error.contains("insufficient funds"));
    assert!(!rc.error.contains("order failed"));
    assert_eq!(rc.workflow.unwrap().workflow_id, "payment");
}

#[tokio::test]
async fn single_failing_workflow_is_workflow_failed() {
    let source = Arc::new(InMemoryHistory::new());
    let mut b = HistoryBuilder::new(exec("lonely").with_run("r1"));
    b.workflow_started("LonelyWorkflow");
    b.workflow_failed("bad input");
    source.insert(b.build());

    let trace = analyzer(source)
        .trace(&exec("lonely"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(trace.chain.len(), 1);
    assert!(trace.chain[0].is_leaf);
    let rc = trace.root_cause.unwrap();
    assert_eq!(rc.kind, RootCauseKind::WorkflowFailed);
    assert_eq!(rc.kind.as_str(), "WorkflowFailed");
}

#[tokio::test]
async fn successful_execution_has_no_root_cause() {
    let source = Arc::new(InMemoryHistory::new());
    let mut b = HistoryBuilder::new(exec("fine").with_run("r1"));
    b.workflow_started("FineWorkflow");
    b.workflow_completed();
    source.insert(b.build());

    let trace = analyzer(source)
        .trace(&exec("fine"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(trace.root_cause.is_none());
}

#[tokio::test]
async fn tracing_twice_is_identical() {
    let source = Arc::new(InMemoryHistory::new());
    let mut parent = HistoryBuilder::new(exec("batch").with_run("b1"));
    parent.workflow_started("BatchWorkflow");
    for id in ["item-1", "item-2"] {
        let init = parent.child_initiated(&exec(id), "ItemWorkflow");
        parent.child_failed(init, "item failed");
    }
    parent.workflow_failed("batch failed");
    source.insert(parent.build());
    for id in ["item-1", "item-2"] {
        let mut child = HistoryBuilder::new(exec(id).with_run("r1"));
        child.workflow_started("ItemWorkflow");
        let act = child.activity_scheduled("Process", "p");
        child.activity_failed(act, &format!("{id} rejected"));
        child.workflow_failed("activity error");
        source.insert(child.build());
    }

    let analyzer = analyzer(source);
    let first = analyzer
        .trace(&exec("batch"), &CancellationToken::new())
        .await
        .unwrap();
    let second = analyzer
        .trace(&exec("batch"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.chain, second.chain);
    assert_eq!(first.root_cause, second.root_cause);
    assert_eq!(first.chain.len(), 3);
    assert_eq!(
        first.root_cause.unwrap().kind,
        RootCauseKind::ActivityFailed
    );
}

#[tokio::test]
async fn failures_cover_matches_and_exclude_unrelated() {
    let source = Arc::new(InMemoryHistory::new());
    let window = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    for id in ["pay-1", "pay-2", "pay-3"] {
        let mut b = HistoryBuilder::new(exec(id).with_run("r1")).starting_at(window);
        b.workflow_started("PaymentWorkflow");
        let act = b.activity_scheduled("Charge", "c");
        b.activity_failed(act, "card declined");
        b.workflow_failed("activity error");
        source.insert(b.build());
    }
    // Failed, but before the window.
    let mut old = HistoryBuilder::new(exec("pay-old").with_run("r1"));
    old.workflow_started("PaymentWorkflow");
    old.workflow_failed("ancient");
    source.insert(old.build());
    // Failed, but a different workflow type.
    let mut other = HistoryBuilder::new(exec("ship-1").with_run("r1")).starting_at(window);
    other.workflow_started("ShipWorkflow");
    other.workflow_failed("carrier down");
    source.insert(other.build());
    // In the window but completed.
    let mut ok = HistoryBuilder::new(exec("pay-ok").with_run("r1")).starting_at(window);
    ok.workflow_started("PaymentWorkflow");
    ok.workflow_completed();
    source.insert(ok.build());

    let query = FailuresQuery {
        since: Some(window),
        filters: vec![AttributeFilter::new("WorkflowType", "PaymentWorkflow")],
        ..Default::default()
    };
    let result = analyzer(source)
        .failures(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.failures.len() >= 3);
    for entry in &result.failures {
        assert!(!entry.root_workflow.workflow_id.is_empty());
        assert!(!entry.status.is_empty());
    }
    let ids: HashSet<&str> = result
        .failures
        .iter()
        .map(|f| f.root_workflow.workflow_id.as_str())
        .collect();
    for unrelated in ["pay-old", "ship-1", "pay-ok"] {
        assert!(!ids.contains(unrelated));
    }
}

#[tokio::test]
async fn compact_timeline_is_nonempty_subset() {
    let source = Arc::new(InMemoryHistory::new());
    let mut b = HistoryBuilder::new(exec("busy").with_run("r1"));
    b.workflow_started("BusyWorkflow");
    for i in 0..3 {
        let act = b.activity_scheduled("Poll", "poll");
        b.activity_started(act, i + 1);
        b.activity_failed(act, "not ready");
    }
    let last = b.activity_scheduled("Poll", "poll");
    b.activity_started(last, 4);
    b.activity_completed(last);
    let t = b.timer_started("wait");
    b.timer_fired(t);
    b.signal("nudge");
    b.event("SomeFutureEvent", serde_json::json!({}));
    b.workflow_completed();
    source.insert(b.build());

    let analyzer = analyzer(source);
    let cancel = CancellationToken::new();
    let full = analyzer
        .timeline(&exec("busy"), &TimelineOptions::default(), &cancel)
        .await
        .unwrap();
    let compacted = analyzer
        .timeline(&exec("busy"), &compact(), &cancel)
        .await
        .unwrap();

    assert!(!compacted.events.is_empty());
    assert!(compacted.events.len() < full.events.len());
    let full_ids: HashSet<i64> = full.events.iter().map(|e| e.event_id).collect();
    assert!(compacted.events.iter().all(|e| full_ids.contains(&e.event_id)));
    assert!(compacted
        .events
        .iter()
        .all(|e| e.status.as_deref() != Some("started")));
}

#[tokio::test]
async fn sqlite_store_backs_the_analyzer() {
    let store = Arc::new(HistoryStore::in_memory().unwrap());
    let mut parent = HistoryBuilder::new(exec("order").with_run("p1"));
    parent.workflow_started("OrderWorkflow");
    let init = parent.child_initiated(&exec("payment"), "PaymentWorkflow");
    parent.child_failed(init, "child failed");
    parent.workflow_failed("child workflow execution error");
    store.import(&parent.build()).unwrap();

    let mut child = HistoryBuilder::new(exec("payment").with_run("c1"));
    child.workflow_started("PaymentWorkflow");
    child.workflow_failed("insufficient funds");
    store.import(&child.build()).unwrap();

    let analyzer = Analyzer::from_source(store, AnalysisConfig::default());
    let result = analyzer
        .failures(&FailuresQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.failures.len(), 2);
    assert!(result.failures.iter().all(|f| f
        .root_cause
        .as_ref()
        .is_some_and(|rc| rc.error == "insufficient funds")));
}
