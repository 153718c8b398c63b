//! Raw history events: the immutable, platform-supplied log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionInfo, ExecutionRef, WorkflowStatus};
use crate::lifecycle::FailureInfo;

// ---------------------------------------------------------------------------
// RawEvent: one entry of an execution history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Position in the history. Strictly increasing within one history.
    pub sequence_id: i64,

    /// Platform event type name, e.g. "ActivityTaskScheduled".
    pub kind: String,

    pub timestamp: DateTime<Utc>,

    /// Kind-specific payload.
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl RawEvent {
    pub fn new(sequence_id: i64, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence_id,
            kind: kind.name().to_string(),
            timestamp,
            attributes: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn event_kind(&self) -> EventKind {
        EventKind::parse(&self.kind)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(|v| v.as_i64())
    }

    /// Back-reference to the event that opened this event's lifecycle.
    pub fn initiating_sequence_id(&self) -> Option<i64> {
        self.attr_i64("initiating_sequence_id")
    }

    /// Normalized failure payload, if the event carries one.
    ///
    /// Accepts either `{"failure": {"type": .., "message": ..}}` or a bare
    /// `{"failure": "message"}`.
    pub fn failure(&self) -> Option<FailureInfo> {
        match self.attributes.get("failure")? {
            serde_json::Value::String(message) => Some(FailureInfo::new(message.clone())),
            serde_json::Value::Object(obj) => {
                let message = obj.get("message").and_then(|v| v.as_str()).unwrap_or("");
                let failure_type = obj
                    .get("type")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                Some(FailureInfo {
                    failure_type,
                    message: message.to_string(),
                })
            }
            _ => None,
        }
    }

    /// Child execution identity embedded in child-workflow events.
    pub fn child_execution(&self) -> Option<ExecutionRef> {
        let workflow_id = self.attr_str("workflow_id")?;
        Some(ExecutionRef {
            namespace: self.attr_str("namespace").unwrap_or_default().to_string(),
            workflow_id: workflow_id.to_string(),
            run_id: self.attr_str("run_id").map(|s| s.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// EventKind: recognised event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionTimedOut,
    WorkflowExecutionCanceled,
    WorkflowExecutionTerminated,
    WorkflowExecutionContinuedAsNew,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,
    TimerStarted,
    TimerFired,
    TimerCanceled,
    StartChildWorkflowExecutionInitiated,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionTimedOut,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTerminated,
    WorkflowExecutionSignaled,
    /// Any kind this engine does not recognise.
    Unknown(String),
}

const KNOWN_KINDS: &[EventKind] = &[
    EventKind::WorkflowExecutionStarted,
    EventKind::WorkflowExecutionCompleted,
    EventKind::WorkflowExecutionFailed,
    EventKind::WorkflowExecutionTimedOut,
    EventKind::WorkflowExecutionCanceled,
    EventKind::WorkflowExecutionTerminated,
    EventKind::WorkflowExecutionContinuedAsNew,
    EventKind::ActivityTaskScheduled,
    EventKind::ActivityTaskStarted,
    EventKind::ActivityTaskCompleted,
    EventKind::ActivityTaskFailed,
    EventKind::ActivityTaskTimedOut,
    EventKind::ActivityTaskCanceled,
    EventKind::TimerStarted,
    EventKind::TimerFired,
    EventKind::TimerCanceled,
    EventKind::StartChildWorkflowExecutionInitiated,
    EventKind::ChildWorkflowExecutionStarted,
    EventKind::ChildWorkflowExecutionCompleted,
    EventKind::ChildWorkflowExecutionFailed,
    EventKind::ChildWorkflowExecutionTimedOut,
    EventKind::ChildWorkflowExecutionCanceled,
    EventKind::ChildWorkflowExecutionTerminated,
    EventKind::WorkflowExecutionSignaled,
];

impl EventKind {
    pub fn name(&self) -> &str {
        match self {
            EventKind::WorkflowExecutionStarted => "WorkflowExecutionStarted",
            EventKind::WorkflowExecutionCompleted => "WorkflowExecutionCompleted",
            EventKind::WorkflowExecutionFailed => "WorkflowExecutionFailed",
            EventKind::WorkflowExecutionTimedOut => "WorkflowExecutionTimedOut",
            EventKind::WorkflowExecutionCanceled => "WorkflowExecutionCanceled",
            EventKind::WorkflowExecutionTerminated => "WorkflowExecutionTerminated",
            EventKind::WorkflowExecutionContinuedAsNew => "WorkflowExecutionContinuedAsNew",
            EventKind::ActivityTaskScheduled => "ActivityTaskScheduled",
            EventKind::ActivityTaskStarted => "ActivityTaskStarted",
            EventKind::ActivityTaskCompleted => "ActivityTaskCompleted",
            EventKind::ActivityTaskFailed => "ActivityTaskFailed",
            EventKind::ActivityTaskTimedOut => "ActivityTaskTimedOut",
            EventKind::ActivityTaskCanceled => "ActivityTaskCanceled",
            EventKind::TimerStarted => "TimerStarted",
            EventKind::TimerFired => "TimerFired",
            EventKind::TimerCanceled => "TimerCanceled",
            EventKind::StartChildWorkflowExecutionInitiated => {
                "StartChildWorkflowExecutionInitiated"
            }
            EventKind::ChildWorkflowExecutionStarted => "ChildWorkflowExecutionStarted",
            EventKind::ChildWorkflowExecutionCompleted => "ChildWorkflowExecutionCompleted",
            EventKind::ChildWorkflowExecutionFailed => "ChildWorkflowExecutionFailed",
            EventKind::ChildWorkflowExecutionTimedOut => "ChildWorkflowExecutionTimedOut",
            EventKind::ChildWorkflowExecutionCanceled => "ChildWorkflowExecutionCanceled",
            EventKind::ChildWorkflowExecutionTerminated => "ChildWorkflowExecutionTerminated",
            EventKind::WorkflowExecutionSignaled => "WorkflowExecutionSignaled",
            EventKind::Unknown(name) => name,
        }
    }

    /// Workflow status after this event, for workflow-level milestones.
    pub fn workflow_status(&self) -> Option<WorkflowStatus> {
        match self {
            EventKind::WorkflowExecutionStarted => Some(WorkflowStatus::Running),
            EventKind::WorkflowExecutionCompleted => Some(WorkflowStatus::Completed),
            EventKind::WorkflowExecutionFailed => Some(WorkflowStatus::Failed),
            EventKind::WorkflowExecutionTimedOut => Some(WorkflowStatus::TimedOut),
            EventKind::WorkflowExecutionCanceled => Some(WorkflowStatus::Canceled),
            EventKind::WorkflowExecutionTerminated => Some(WorkflowStatus::Terminated),
            EventKind::WorkflowExecutionContinuedAsNew => Some(WorkflowStatus::ContinuedAsNew),
            _ => None,
        }
    }

    /// Parse a platform event type name. Accepts the bare name and the
    /// `EVENT_TYPE_SCREAMING_CASE` wire form.
    pub fn parse(name: &str) -> EventKind {
        let bare = name.strip_prefix("EVENT_TYPE_").unwrap_or(name);
        let folded: String = bare.chars().filter(|c| *c != '_').collect();
        KNOWN_KINDS
            .iter()
            .find(|k| k.name().eq_ignore_ascii_case(&folded))
            .cloned()
            .unwrap_or_else(|| EventKind::Unknown(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// History: a full, ordered event list for one execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    /// Execution identity with the run ID resolved.
    pub execution: ExecutionRef,
    pub events: Vec<RawEvent>,
}

impl History {
    /// Visibility row for this history, derived from its workflow milestones.
    pub fn execution_info(&self) -> ExecutionInfo {
        let mut info = ExecutionInfo {
            execution: self.execution.clone(),
            workflow_type: None,
            status: WorkflowStatus::Unknown,
            start_time: None,
            close_time: None,
            search_attributes: Default::default(),
        };
        for event in &self.events {
            let Some(status) = event.event_kind().workflow_status() else {
                continue;
            };
            info.status = status;
            if status == WorkflowStatus::Running {
                info.start_time = Some(event.timestamp);
                info.workflow_type = event.attr_str("workflow_type").map(|s| s.to_string());
                if let Some(attrs) = event.attributes.get("search_attributes").and_then(|v| v.as_object()) {
                    for (key, value) in attrs {
                        let value = match value {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        info.search_attributes.insert(key.clone(), value);
                    }
                }
            } else {
                info.close_time = Some(event.timestamp);
            }
        }
        info
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
