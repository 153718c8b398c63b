//! Trace types: execution chains and their root cause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::execution::{ExecutionRef, WorkflowStatus};

// ---------------------------------------------------------------------------
// ChainNode: one execution within a chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    pub execution: ExecutionRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,

    /// Child-workflow hops from the root (0 = root).
    pub depth: u32,

    pub status: WorkflowStatus,

    /// No further child was traversed below this node.
    #[serde(rename = "leaf")]
    pub is_leaf: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDescriptor>,
}

// ---------------------------------------------------------------------------
// FailureDescriptor: the most causal failure visible in one execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub source: FailureSource,

    /// How the failing thing ended.
    pub outcome: FailureOutcome,

    pub message: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,

    /// Activity type when the source is an activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    /// A workflow-level milestone of the execution itself.
    Workflow,
    Activity,
    ChildWorkflow,
    /// The execution's history could not be fetched.
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    Failed,
    TimedOut,
    Canceled,
    Terminated,
    Unknown,
}

// ---------------------------------------------------------------------------
// RootCause
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootCauseKind {
    WorkflowFailed,
    ActivityFailed,
    ChildWorkflowFailed,
    Timeout,
    Canceled,
    Unknown,
}

impl RootCauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCauseKind::WorkflowFailed => "WorkflowFailed",
            RootCauseKind::ActivityFailed => "ActivityFailed",
            RootCauseKind::ChildWorkflowFailed => "ChildWorkflowFailed",
            RootCauseKind::Timeout => "Timeout",
            RootCauseKind::Canceled => "Canceled",
            RootCauseKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RootCauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    #[serde(rename = "type")]
    pub kind: RootCauseKind,

    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Execution in which the root cause was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<ExecutionRef>,
}

impl RootCause {
    /// One-line summary, e.g. "ActivityFailed: Charge - card declined".
    pub fn summary(&self) -> String {
        match &self.activity {
            Some(activity) => format!("{}: {} - {}", self.kind, activity, self.error),
            None => format!("{}: {}", self.kind, self.error),
        }
    }
}

// ---------------------------------------------------------------------------
// TraceResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    /// Nodes in depth-first pre-order, root first.
    pub chain: Vec<ChainNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<RootCause>,

    /// Maximum depth reached.
    pub depth: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
