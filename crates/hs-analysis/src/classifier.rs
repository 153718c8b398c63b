//! Event classifier: maps a raw event to (category, stage, correlation key).

use hs_core::event::{EventKind, RawEvent};
use hs_core::lifecycle::{Category, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub stage: Stage,
    /// Sequence ID of the initiating event. `None` for workflow milestones
    /// and unclassifiable events.
    pub correlation_key: Option<i64>,
}

impl Classification {
    fn other() -> Self {
        Self {
            category: Category::Other,
            stage: Stage::Info,
            correlation_key: None,
        }
    }

    fn milestone(stage: Stage) -> Self {
        Self {
            category: Category::Workflow,
            stage,
            correlation_key: None,
        }
    }

    pub fn is_milestone(&self) -> bool {
        self.category == Category::Workflow
    }

    /// Whether this event belongs to a lifecycle record.
    pub fn is_lifecycle(&self) -> bool {
        self.correlation_key.is_some()
    }
}

/// Classify one event. Never fails: unknown kinds and follow-up events with
/// a missing or forward back-reference classify as `other`/`info`.
pub fn classify(event: &RawEvent) -> Classification {
    use EventKind::*;

    let kind = event.event_kind();
    let opening = |category| Classification {
        category,
        stage: opening_stage(category),
        correlation_key: Some(event.sequence_id),
    };
    let follow_up = |category, stage| match event.initiating_sequence_id() {
        Some(key) if key < event.sequence_id => Classification {
            category,
            stage,
            correlation_key: Some(key),
        },
        _ => Classification::other(),
    };

    match kind {
        WorkflowExecutionStarted => Classification::milestone(Stage::Started),
        WorkflowExecutionCompleted => Classification::milestone(Stage::Completed),
        WorkflowExecutionFailed => Classification::milestone(Stage::Failed),
        WorkflowExecutionTimedOut => Classification::milestone(Stage::TimedOut),
        WorkflowExecutionCanceled => Classification::milestone(Stage::Canceled),
        WorkflowExecutionTerminated => Classification::milestone(Stage::Terminated),
        WorkflowExecutionContinuedAsNew => Classification::milestone(Stage::ContinuedAsNew),

        ActivityTaskScheduled => opening(Category::Activity),
        ActivityTaskStarted => follow_up(Category::Activity, Stage::Started),
        ActivityTaskCompleted => follow_up(Category::Activity, Stage::Completed),
        ActivityTaskFailed => follow_up(Category::Activity, Stage::Failed),
        ActivityTaskTimedOut => follow_up(Category::Activity, Stage::TimedOut),
        ActivityTaskCanceled => follow_up(Category::Activity, Stage::Canceled),

        TimerStarted => opening(Category::Timer),
        TimerFired => follow_up(Category::Timer, Stage::Fired),
        TimerCanceled => follow_up(Category::Timer, Stage::Canceled),

        StartChildWorkflowExecutionInitiated => opening(Category::ChildWorkflow),
        ChildWorkflowExecutionStarted => follow_up(Category::ChildWorkflow, Stage::Started),
        ChildWorkflowExecutionCompleted => follow_up(Category::ChildWorkflow, Stage::Completed),
        ChildWorkflowExecutionFailed => follow_up(Category::ChildWorkflow, Stage::Failed),
        ChildWorkflowExecutionTimedOut => follow_up(Category::ChildWorkflow, Stage::TimedOut),
        ChildWorkflowExecutionCanceled => follow_up(Category::ChildWorkflow, Stage::Canceled),
        ChildWorkflowExecutionTerminated => {
            follow_up(Category::ChildWorkflow, Stage::Terminated)
        }

        WorkflowExecutionSignaled => opening(Category::Signal),

        Unknown(_) => Classification::other(),
    }
}

fn opening_stage(category: Category) -> Stage {
    match category {
        Category::ChildWorkflow => Stage::Initiated,
        Category::Signal => Stage::Received,
        _ => Stage::Scheduled,
    }
}
