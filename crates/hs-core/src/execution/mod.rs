//! Execution identity and workflow-level status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ExecutionRef: namespace + workflow ID + run ID
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionRef {
    pub namespace: String,
    pub workflow_id: String,

    /// Run ID. `None` means "the latest run of this workflow ID".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ExecutionRef {
    pub fn new(namespace: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            workflow_id: workflow_id.into(),
            run_id: None,
        }
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// True when both refs name the same workflow, treating a missing run ID
    /// on either side as a wildcard.
    pub fn same_workflow(&self, other: &ExecutionRef) -> bool {
        self.namespace == other.namespace
            && self.workflow_id == other.workflow_id
            && match (&self.run_id, &other.run_id) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl fmt::Display for ExecutionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run_id {
            Some(run) => write!(f, "{}/{}/{}", self.namespace, self.workflow_id, run),
            None => write!(f, "{}/{}", self.namespace, self.workflow_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
    Unknown,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "Running",
            WorkflowStatus::Completed => "Completed",
            WorkflowStatus::Failed => "Failed",
            WorkflowStatus::Canceled => "Canceled",
            WorkflowStatus::Terminated => "Terminated",
            WorkflowStatus::ContinuedAsNew => "ContinuedAsNew",
            WorkflowStatus::TimedOut => "TimedOut",
            WorkflowStatus::Unknown => "Unknown",
        }
    }

    /// Parse a PascalCase status name. Returns `None` for unrecognised input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Running" => Some(WorkflowStatus::Running),
            "Completed" => Some(WorkflowStatus::Completed),
            "Failed" => Some(WorkflowStatus::Failed),
            "Canceled" => Some(WorkflowStatus::Canceled),
            "Terminated" => Some(WorkflowStatus::Terminated),
            "ContinuedAsNew" => Some(WorkflowStatus::ContinuedAsNew),
            "TimedOut" => Some(WorkflowStatus::TimedOut),
            "Unknown" => Some(WorkflowStatus::Unknown),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running | WorkflowStatus::Unknown)
    }

    /// Closed without success: the statuses a failures search looks for.
    pub fn is_unsuccessful(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Failed
                | WorkflowStatus::TimedOut
                | WorkflowStatus::Canceled
                | WorkflowStatus::Terminated
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExecutionInfo: one visibility (search) row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub execution: ExecutionRef,

    #[serde(default)]
    pub workflow_type: Option<String>,

    pub status: WorkflowStatus,

    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,

    /// Indexed search attributes (string-valued).
    #[serde(default)]
    pub search_attributes: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip() {
        for status in [
            WorkflowStatus::Running,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
            WorkflowStatus::Canceled,
            WorkflowStatus::Terminated,
            WorkflowStatus::ContinuedAsNew,
            WorkflowStatus::TimedOut,
        ] {
            assert_eq!(WorkflowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WorkflowStatus::parse("failed"), None);
    }

    #[test]
    fn same_workflow_treats_missing_run_as_wildcard() {
        let a = ExecutionRef::new("default", "order-1");
        let b = ExecutionRef::new("default", "order-1").with_run("r1");
        let c = ExecutionRef::new("default", "order-1").with_run("r2");
        assert!(a.same_workflow(&b));
        assert!(!b.same_workflow(&c));
        assert_eq!(b.to_string(), "default/order-1/r1");
    }
}
