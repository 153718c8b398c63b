//! Timeline view types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::ExecutionRef;
use crate::lifecycle::Category;

// ---------------------------------------------------------------------------
// TimelineEvent: one display row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// Sequence ID of the source event; the identity of this row.
    pub event_id: i64,

    /// Original event type name.
    #[serde(rename = "type")]
    pub event_type: String,

    pub category: Category,

    /// Transition name; absent for workflow milestones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set on terminal transitions: close time minus open time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_workflow: Option<ExecutionRef>,

    /// Folded retries behind this row (compact mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

// ---------------------------------------------------------------------------
// TimelineResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResult {
    pub workflow: ExecutionRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,

    /// Terminal workflow status, or "Running".
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    pub events: Vec<TimelineEvent>,

    /// Number of raw events in the history.
    pub event_count: usize,
}
