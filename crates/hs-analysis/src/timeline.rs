//! Timeline builder: projects a history into chronologically ordered rows.

use crate::classifier::{classify, Classification};
use crate::correlator::{correlate, default_failure, Correlation};
use hs_core::event::{History, RawEvent};
use hs_core::lifecycle::{Category, Stage};
use hs_core::timeline::{TimelineEvent, TimelineResult};
use std::collections::HashSet;

/// Projection options for [`build_timeline`].
#[derive(Debug, Clone, Default)]
pub struct TimelineOptions {
    /// Keep milestones plus the first and terminal transition of each lifecycle.
    pub compact: bool,

    /// Event type or category names to keep. Empty = keep all.
    pub include: Vec<String>,

    /// Event type or category names to drop.
    pub exclude: Vec<String>,

    /// Show every activity attempt instead of folding retries.
    pub per_attempt: bool,
}

impl TimelineOptions {
    fn admits(&self, row: &TimelineEvent) -> bool {
        let hit = |names: &[String]| {
            names.iter().any(|n| {
                n.eq_ignore_ascii_case(&row.event_type) || n.eq_ignore_ascii_case(row.category.as_str())
            })
        };
        (self.include.is_empty() || hit(&self.include)) && !hit(&self.exclude)
    }
}

/// Build the timeline for an already-fetched history.
pub fn build_timeline(history: &History, options: &TimelineOptions) -> TimelineResult {
    let correlation = correlate(&history.events, options.per_attempt);
    let keep = options.compact.then(|| compact_ids(&correlation));

    let mut events: Vec<TimelineEvent> = history
        .events
        .iter()
        .filter(|e| keep.as_ref().map_or(true, |ids| ids.contains(&e.sequence_id)))
        .map(|e| project(e, &classify(e), &correlation))
        .filter(|row| options.admits(row))
        .collect();
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.event_id.cmp(&b.event_id))
    });

    let info = history.execution_info();
    let status = if info.status.is_terminal() {
        info.status.as_str().to_string()
    } else {
        "Running".to_string()
    };
    let duration_ms = match (info.start_time, info.close_time) {
        (Some(start), Some(close)) => Some((close - start).num_milliseconds()),
        _ => None,
    };

    TimelineResult {
        workflow: history.execution.clone(),
        workflow_type: info.workflow_type,
        status,
        start_time: info.start_time,
        close_time: info.close_time,
        duration_ms,
        events,
        event_count: history.events.len(),
    }
}

/// Sequence IDs kept in compact mode.
fn compact_ids(correlation: &Correlation) -> HashSet<i64> {
    let mut ids: HashSet<i64> = correlation.milestones.iter().map(|e| e.sequence_id).collect();
    for key in correlation.records.keys() {
        let Some(transitions) = correlation.transitions.get(key) else {
            continue;
        };
        if let Some((seq, _)) = transitions.iter().find(|(_, stage)| stage.is_opening()) {
            ids.insert(*seq);
        }
        if let Some((seq, _)) = transitions.iter().rev().find(|(_, stage)| stage.is_terminal()) {
            ids.insert(*seq);
        }
    }
    ids
}

fn project(event: &RawEvent, class: &Classification, correlation: &Correlation) -> TimelineEvent {
    let mut row = TimelineEvent {
        timestamp: event.timestamp,
        event_id: event.sequence_id,
        event_type: event.kind.clone(),
        category: class.category,
        status: None,
        name: None,
        activity_id: None,
        error: None,
        duration_ms: None,
        attempt: event.attr_i64("attempt"),
        child_workflow: None,
        retry_count: None,
    };

    if class.is_milestone() {
        row.name = event.attr_str("workflow_type").map(|s| s.to_string());
        row.error = milestone_error(event, class.stage);
        return row;
    }

    let Some(record) = class.correlation_key.and_then(|key| correlation.record(key)) else {
        return row;
    };
    row.status = Some(class.stage.as_str().to_string());
    row.name = record.name.clone();
    row.activity_id = record.activity_id.clone();
    if record.category == Category::ChildWorkflow {
        row.child_workflow = record.child.clone();
    }
    if class
        .stage
        .lifecycle_status()
        .is_some_and(|s| s.is_failure())
    {
        let failure = event
            .failure()
            .unwrap_or_else(|| default_failure(class.stage, event));
        row.error = Some(failure.message);
    }
    if class.stage.is_terminal() && !class.stage.is_opening() {
        row.duration_ms = record
            .opened_at()
            .map(|opened| (event.timestamp - opened).num_milliseconds());
    }
    if record.attempts > 1 && correlation.records.contains_key(&record.correlation_id) {
        row.retry_count = Some(record.attempts - 1);
    }
    row
}

fn milestone_error(event: &RawEvent, stage: Stage) -> Option<String> {
    match stage {
        Stage::Failed | Stage::Terminated | Stage::Canceled => {
            event.failure().map(|f| f.message).or_else(|| {
                event.attr_str("reason").map(|s| s.to_string())
            })
        }
        Stage::TimedOut => Some("workflow execution timed out".to_string()),
        _ => None,
    }
}
