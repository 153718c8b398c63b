//! Lifecycle records: logical instructions reconstructed from raw events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::execution::ExecutionRef;

// ---------------------------------------------------------------------------
// Category & stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Workflow,
    Activity,
    Timer,
    ChildWorkflow,
    Signal,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Workflow => "workflow",
            Category::Activity => "activity",
            Category::Timer => "timer",
            Category::ChildWorkflow => "child_workflow",
            Category::Signal => "signal",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an event sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Activity scheduled / timer started.
    Scheduled,
    /// Child workflow initiated.
    Initiated,
    Started,
    Completed,
    /// Timer fired.
    Fired,
    Failed,
    Canceled,
    TimedOut,
    Terminated,
    ContinuedAsNew,
    /// Signal received.
    Received,
    Info,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scheduled => "scheduled",
            Stage::Initiated => "initiated",
            Stage::Started => "started",
            Stage::Completed => "completed",
            Stage::Fired => "fired",
            Stage::Failed => "failed",
            Stage::Canceled => "canceled",
            Stage::TimedOut => "timed_out",
            Stage::Terminated => "terminated",
            Stage::ContinuedAsNew => "continued_as_new",
            Stage::Received => "received",
            Stage::Info => "info",
        }
    }

    /// Stages that open a new lifecycle record.
    pub fn is_opening(&self) -> bool {
        matches!(self, Stage::Scheduled | Stage::Initiated | Stage::Received)
    }

    /// Stages that close a lifecycle record.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::Completed
                | Stage::Fired
                | Stage::Failed
                | Stage::Canceled
                | Stage::TimedOut
                | Stage::Terminated
                | Stage::ContinuedAsNew
                | Stage::Received
        )
    }

    /// Lifecycle status a record takes on after an event at this stage.
    pub fn lifecycle_status(&self) -> Option<LifecycleStatus> {
        match self {
            Stage::Scheduled | Stage::Initiated => Some(LifecycleStatus::Scheduled),
            Stage::Started => Some(LifecycleStatus::Started),
            Stage::Completed | Stage::Fired | Stage::Received => Some(LifecycleStatus::Completed),
            Stage::Failed => Some(LifecycleStatus::Failed),
            Stage::Canceled => Some(LifecycleStatus::Canceled),
            Stage::TimedOut => Some(LifecycleStatus::TimedOut),
            Stage::Terminated => Some(LifecycleStatus::Terminated),
            Stage::ContinuedAsNew | Stage::Info => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Scheduled,
    Started,
    Completed,
    Failed,
    Canceled,
    TimedOut,
    Terminated,
}

impl LifecycleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LifecycleStatus::Scheduled | LifecycleStatus::Started)
    }

    /// Terminal and unsuccessful.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::Failed
                | LifecycleStatus::TimedOut
                | LifecycleStatus::Canceled
                | LifecycleStatus::Terminated
        )
    }
}

// ---------------------------------------------------------------------------
// FailureInfo: normalized error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
    pub message: String,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            failure_type: None,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub category: Category,

    /// Sequence ID of the initiating event.
    pub correlation_id: i64,

    pub status: LifecycleStatus,

    /// Activity type, timer ID, child workflow type or signal name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Logical activity identity; retried attempts share it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,

    /// Child execution identity (child workflows only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<ExecutionRef>,

    /// Number of attempts folded into this record (1 when unfolded).
    pub attempts: u32,

    /// Platform-reported attempt counter of the latest start, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<i64>,

    /// True when the opening event was never seen.
    #[serde(default)]
    pub synthesized: bool,
}

impl LifecycleRecord {
    pub fn new(category: Category, correlation_id: i64, status: LifecycleStatus) -> Self {
        Self {
            category,
            correlation_id,
            status,
            name: None,
            activity_id: None,
            scheduled_at: None,
            started_at: None,
            closed_at: None,
            failure: None,
            child: None,
            attempts: 1,
            last_attempt: None,
            synthesized: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Earliest known timestamp of this record.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at.or(self.started_at)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.opened_at(), self.closed_at) {
            (Some(open), Some(close)) => Some((close - open).num_milliseconds()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_to_status() {
        assert_eq!(Stage::Fired.lifecycle_status(), Some(LifecycleStatus::Completed));
        assert_eq!(Stage::Initiated.lifecycle_status(), Some(LifecycleStatus::Scheduled));
        assert_eq!(Stage::Info.lifecycle_status(), None);
        assert!(Stage::Received.is_opening() && Stage::Received.is_terminal());
        assert!(!Stage::Started.is_terminal());
    }

    #[test]
    fn record_duration_uses_earliest_timestamp() {
        let t0 = Utc::now();
        let mut rec = LifecycleRecord::new(Category::Activity, 5, LifecycleStatus::Started);
        rec.started_at = Some(t0 + chrono::Duration::milliseconds(10));
        rec.closed_at = Some(t0 + chrono::Duration::milliseconds(110));
        assert_eq!(rec.duration_ms(), Some(100));
        rec.scheduled_at = Some(t0);
        assert_eq!(rec.duration_ms(), Some(110));
    }
}
