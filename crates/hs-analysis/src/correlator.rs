//! Lifecycle correlator: folds a sequence-ordered event stream into
//! lifecycle records keyed by correlation ID.

use crate::classifier::{classify, Classification};
use hs_core::event::{EventKind, RawEvent};
use hs_core::lifecycle::{Category, FailureInfo, LifecycleRecord, LifecycleStatus, Stage};
use std::collections::BTreeMap;

/// Output of one correlation pass.
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// Visible records by correlation ID.
    pub records: BTreeMap<i64, LifecycleRecord>,

    /// Earlier attempts folded into a later record, by their own correlation ID.
    pub folded: BTreeMap<i64, LifecycleRecord>,

    /// Events applied to each record (visible or folded), in order.
    pub transitions: BTreeMap<i64, Vec<(i64, Stage)>>,

    /// Workflow-level milestone events, in order.
    pub milestones: Vec<RawEvent>,

    /// Events that belong to no lifecycle and are not milestones.
    pub other: Vec<RawEvent>,
}

impl Correlation {
    /// Record for `key`, whether visible or folded.
    pub fn record(&self, key: i64) -> Option<&LifecycleRecord> {
        self.records.get(&key).or_else(|| self.folded.get(&key))
    }

    /// Child-workflow records, in correlation order.
    pub fn children(&self) -> impl Iterator<Item = &LifecycleRecord> {
        self.records
            .values()
            .filter(|r| r.category == Category::ChildWorkflow)
    }

    /// Last milestone event, if any.
    pub fn last_milestone(&self) -> Option<&RawEvent> {
        self.milestones.last()
    }
}

/// Correlate events in the order given. With `per_attempt` false, activity
/// records sharing an activity ID are folded into the most recent one.
pub fn correlate(events: &[RawEvent], per_attempt: bool) -> Correlation {
    let mut out = Correlation::default();

    for event in events {
        let class = classify(event);
        let Some(key) = class.correlation_key else {
            if class.is_milestone() {
                out.milestones.push(event.clone());
            } else {
                if let EventKind::Unknown(kind) = event.event_kind() {
                    tracing::debug!(kind = %kind, seq = event.sequence_id, "unrecognised event kind");
                } else {
                    tracing::debug!(kind = %event.kind, seq = event.sequence_id, "event has no usable back-reference");
                }
                out.other.push(event.clone());
            }
            continue;
        };

        if apply(&mut out.records, key, event, &class) {
            out.transitions
                .entry(key)
                .or_default()
                .push((event.sequence_id, class.stage));
        }
    }

    if !per_attempt {
        fold_attempts(&mut out);
    }
    out
}

/// Apply one lifecycle event. Returns false when the event changed nothing.
fn apply(
    records: &mut BTreeMap<i64, LifecycleRecord>,
    key: i64,
    event: &RawEvent,
    class: &Classification,
) -> bool {
    let stage = class.stage;

    if stage.is_opening() {
        if records.contains_key(&key) {
            tracing::debug!(seq = event.sequence_id, "duplicate opening event ignored");
            return false;
        }
        let mut record = open_record(class.category, key, event);
        if stage.is_terminal() {
            close_record(&mut record, stage, event);
        }
        records.insert(key, record);
        return true;
    }

    let record = records.entry(key).or_insert_with(|| {
        let mut synthesized = open_record(class.category, key, event);
        synthesized.scheduled_at = None;
        synthesized.synthesized = true;
        synthesized
    });

    // Terminal records are immutable.
    if record.is_closed() {
        tracing::debug!(seq = event.sequence_id, key, "event for closed record ignored");
        return false;
    }

    capture_child_run(record, event);

    if stage == Stage::Started {
        record.status = LifecycleStatus::Started;
        record.started_at = Some(event.timestamp);
        if let Some(attempt) = event.attr_i64("attempt") {
            record.last_attempt = Some(attempt);
        }
        return true;
    }

    if stage.is_terminal() {
        close_record(record, stage, event);
        return true;
    }
    false
}

fn open_record(category: Category, key: i64, event: &RawEvent) -> LifecycleRecord {
    let mut record = LifecycleRecord::new(category, key, LifecycleStatus::Scheduled);
    record.scheduled_at = Some(event.timestamp);
    let name_key = match category {
        Category::Activity => "activity_type",
        Category::Timer => "timer_id",
        Category::ChildWorkflow => "workflow_type",
        Category::Signal => "signal_name",
        Category::Workflow | Category::Other => "name",
    };
    record.name = event.attr_str(name_key).map(|s| s.to_string());
    record.activity_id = event.attr_str("activity_id").map(|s| s.to_string());
    if category == Category::ChildWorkflow {
        record.child = event.child_execution();
    }
    record
}

fn close_record(record: &mut LifecycleRecord, stage: Stage, event: &RawEvent) {
    let Some(status) = stage.lifecycle_status() else {
        return;
    };
    record.status = status;
    record.closed_at = Some(event.timestamp);
    if status.is_failure() {
        record.failure = Some(event.failure().unwrap_or_else(|| default_failure(stage, event)));
    }
}

pub(crate) fn default_failure(stage: Stage, event: &RawEvent) -> FailureInfo {
    let message = match stage {
        Stage::TimedOut => match event.attr_str("timeout_type") {
            Some(kind) => format!("timed out ({kind})"),
            None => "timed out".to_string(),
        },
        Stage::Canceled => "canceled".to_string(),
        Stage::Terminated => "terminated".to_string(),
        _ => "failed".to_string(),
    };
    FailureInfo {
        failure_type: None,
        message,
    }
}

/// Child-workflow follow-ups carry the resolved run ID.
fn capture_child_run(record: &mut LifecycleRecord, event: &RawEvent) {
    if record.category != Category::ChildWorkflow {
        return;
    }
    match record.child.as_mut() {
        Some(child) => {
            if child.run_id.is_none() {
                child.run_id = event.attr_str("run_id").map(|s| s.to_string());
            }
        }
        None => record.child = event.child_execution(),
    }
}

/// Keep only the most recent record per activity ID; earlier ones move to
/// `folded` and their count lands in `attempts`.
fn fold_attempts(out: &mut Correlation) {
    let mut latest: BTreeMap<String, i64> = BTreeMap::new();
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for record in out.records.values() {
        if record.category != Category::Activity {
            continue;
        }
        let Some(id) = &record.activity_id else {
            continue;
        };
        latest.insert(id.clone(), record.correlation_id);
        *counts.entry(id.clone()).or_insert(0) += 1;
    }

    let superseded: Vec<i64> = out
        .records
        .values()
        .filter(|r| r.category == Category::Activity)
        .filter(|r| {
            r.activity_id
                .as_ref()
                .and_then(|id| latest.get(id))
                .is_some_and(|&keep| keep != r.correlation_id)
        })
        .map(|r| r.correlation_id)
        .collect();

    for key in superseded {
        if let Some(record) = out.records.remove(&key) {
            out.folded.insert(key, record);
        }
    }
    for (id, keep) in latest {
        if let (Some(record), Some(&count)) = (out.records.get_mut(&keep), counts.get(&id)) {
            record.attempts = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::execution::ExecutionRef;
    use hs_history::memory::HistoryBuilder;
    use serde_json::json;

    fn builder() -> HistoryBuilder {
        HistoryBuilder::new(ExecutionRef::new("default", "order-1").with_run("r1"))
    }

    #[test]
    fn activity_triplet_yields_one_completed_record() {
        let mut b = builder();
        b.workflow_started("OrderWorkflow");
        let act = b.activity_scheduled("Charge", "1");
        b.activity_started(act, 1);
        b.activity_completed(act);
        b.workflow_completed();
        let c = correlate(&b.build().events, false);

        assert_eq!(c.records.len(), 1);
        let rec = &c.records[&act];
        assert_eq!(rec.category, Category::Activity);
        assert_eq!(rec.status, LifecycleStatus::Completed);
        assert_eq!(rec.name.as_deref(), Some("Charge"));
        assert!(rec.scheduled_at.is_some() && rec.started_at.is_some() && rec.closed_at.is_some());
        assert_eq!(c.milestones.len(), 2);
        assert_eq!(c.transitions[&act].len(), 3);
    }

    #[test]
    fn missing_schedule_synthesizes_record() {
        let mut b = builder();
        b.workflow_started("W");
        b.event(
            "ActivityTaskStarted",
            json!({"initiating_sequence_id": 1, "attempt": 3}),
        );
        let c = correlate(&b.build().events, false);
        let rec = &c.records[&1];
        assert!(rec.synthesized);
        assert_eq!(rec.status, LifecycleStatus::Started);
        assert_eq!(rec.last_attempt, Some(3));
        assert!(rec.scheduled_at.is_none());
    }

    #[test]
    fn closed_records_are_immutable() {
        let mut b = builder();
        let act = b.activity_scheduled("Charge", "1");
        b.activity_failed(act, "first");
        b.activity_completed(act);
        let c = correlate(&b.build().events, false);
        let rec = &c.records[&act];
        assert_eq!(rec.status, LifecycleStatus::Failed);
        assert_eq!(rec.failure.as_ref().unwrap().message, "first");
        assert_eq!(c.transitions[&act].len(), 2);
    }

    #[test]
    fn retries_fold_into_latest_unless_per_attempt() {
        let mut b = builder();
        let first = b.activity_scheduled("Charge", "pay");
        b.activity_failed(first, "declined");
        let second = b.activity_scheduled("Charge", "pay");
        b.activity_completed(second);
        let events = b.build().events;

        let folded = correlate(&events, false);
        assert_eq!(folded.records.len(), 1);
        assert_eq!(folded.records[&second].attempts, 2);
        assert_eq!(folded.records[&second].status, LifecycleStatus::Completed);
        assert!(folded.folded.contains_key(&first));
        assert!(folded.record(first).is_some());

        let detailed = correlate(&events, true);
        assert_eq!(detailed.records.len(), 2);
        assert_eq!(detailed.records[&first].status, LifecycleStatus::Failed);
    }

    #[test]
    fn child_identity_and_run_id_are_captured() {
        let mut b = builder();
        let child = ExecutionRef::new("default", "payment-1");
        let init = b.child_initiated(&child, "PaymentWorkflow");
        b.child_started(init, "child-run");
        b.child_failed(init, "payment declined");
        let c = correlate(&b.build().events, false);

        let rec = c.children().next().unwrap();
        let identity = rec.child.as_ref().unwrap();
        assert_eq!(identity.workflow_id, "payment-1");
        assert_eq!(identity.run_id.as_deref(), Some("child-run"));
        assert_eq!(rec.status, LifecycleStatus::Failed);
        assert_eq!(rec.name.as_deref(), Some("PaymentWorkflow"));
    }

    #[test]
    fn signals_open_and_close_at_once() {
        let mut b = builder();
        let sig = b.signal("approve");
        b.event("SomethingNew", json!({}));
        let c = correlate(&b.build().events, false);
        assert_eq!(c.records[&sig].status, LifecycleStatus::Completed);
        assert_eq!(c.other.len(), 1);
    }

    #[test]
    fn timeouts_get_a_default_failure() {
        let mut b = builder();
        let act = b.activity_scheduled("Ship", "s");
        b.activity_timed_out(act);
        let c = correlate(&b.build().events, false);
        let rec = &c.records[&act];
        assert_eq!(rec.status, LifecycleStatus::TimedOut);
        assert_eq!(rec.failure.as_ref().unwrap().message, "timed out");
    }
}
