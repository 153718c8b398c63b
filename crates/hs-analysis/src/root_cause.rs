//! Root-cause resolver.

use hs_core::trace::{ChainNode, FailureDescriptor, FailureOutcome, FailureSource, RootCause, RootCauseKind};

/// Last failing node in traversal order. The chain is pre-order, so this is
/// the deepest failure of the last failing subtree. `None` when no node
/// carries a failure.
pub fn resolve(chain: &[ChainNode]) -> Option<RootCause> {
    let node = chain.iter().rev().find(|n| n.failure.is_some())?;
    let failure = node.failure.as_ref()?;
    Some(RootCause {
        kind: classify(failure),
        error: failure.message.clone(),
        activity: failure.activity.clone(),
        timestamp: failure.timestamp,
        workflow: Some(node.execution.clone()),
    })
}

pub fn classify(failure: &FailureDescriptor) -> RootCauseKind {
    match (failure.source, failure.outcome) {
        (FailureSource::Unreachable, _) => RootCauseKind::Unknown,
        (_, FailureOutcome::TimedOut) => RootCauseKind::Timeout,
        (_, FailureOutcome::Canceled | FailureOutcome::Terminated) => RootCauseKind::Canceled,
        (_, FailureOutcome::Unknown) => RootCauseKind::Unknown,
        (FailureSource::Workflow, FailureOutcome::Failed) => RootCauseKind::WorkflowFailed,
        (FailureSource::Activity, FailureOutcome::Failed) => RootCauseKind::ActivityFailed,
        (FailureSource::ChildWorkflow, FailureOutcome::Failed) => {
            RootCauseKind::ChildWorkflowFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::execution::{ExecutionRef, WorkflowStatus};

    fn node(id: &str, depth: u32, failure: Option<(FailureSource, FailureOutcome, &str)>) -> ChainNode {
        ChainNode {
            execution: ExecutionRef::new("default", id),
            workflow_type: None,
            depth,
            status: WorkflowStatus::Failed,
            is_leaf: false,
            start_time: None,
            close_time: None,
            duration_ms: None,
            failure: failure.map(|(source, outcome, message)| FailureDescriptor {
                source,
                outcome,
                message: message.into(),
                failure_type: None,
                activity: (source == FailureSource::Activity).then(|| "Charge".to_string()),
                timestamp: None,
            }),
        }
    }

    #[test]
    fn child_failure_beats_wrapping_parent() {
        let chain = vec![
            node("root", 0, Some((FailureSource::ChildWorkflow, FailureOutcome::Failed, "wrapped"))),
            node("mid", 1, Some((FailureSource::Activity, FailureOutcome::Failed, "card declined"))),
            node("ok", 1, None),
        ];
        let rc = resolve(&chain).unwrap();
        assert_eq!(rc.kind, RootCauseKind::ActivityFailed);
        assert_eq!(rc.error, "card declined");
        assert_eq!(rc.activity.as_deref(), Some("Charge"));
        assert_eq!(rc.workflow.unwrap().workflow_id, "mid");
    }

    #[test]
    fn later_sibling_wins() {
        let chain = vec![
            node("root", 0, None),
            node("a", 1, Some((FailureSource::Workflow, FailureOutcome::Failed, "first"))),
            node("b", 1, Some((FailureSource::Workflow, FailureOutcome::TimedOut, "second"))),
        ];
        let rc = resolve(&chain).unwrap();
        assert_eq!(rc.kind, RootCauseKind::Timeout);
        assert_eq!(rc.error, "second");
    }

    #[test]
    fn last_failing_subtree_beats_a_deeper_earlier_one() {
        // root -> a -> a1, then root -> b
        let chain = vec![
            node("root", 0, Some((FailureSource::ChildWorkflow, FailureOutcome::Failed, "root boom"))),
            node("a", 1, Some((FailureSource::ChildWorkflow, FailureOutcome::Failed, "a boom"))),
            node("a1", 2, Some((FailureSource::Activity, FailureOutcome::Failed, "a1 boom"))),
            node("b", 1, Some((FailureSource::Workflow, FailureOutcome::Failed, "b boom"))),
        ];
        let rc = resolve(&chain).unwrap();
        assert_eq!(rc.workflow.unwrap().workflow_id, "b");
        assert_eq!(rc.error, "b boom");
        assert_eq!(rc.kind, RootCauseKind::WorkflowFailed);
    }

    #[test]
    fn successful_trailing_nodes_are_skipped() {
        let chain = vec![
            node("root", 0, Some((FailureSource::ChildWorkflow, FailureOutcome::Failed, "wrapped"))),
            node("a", 1, Some((FailureSource::Activity, FailureOutcome::Failed, "card declined"))),
            node("b", 1, None),
            node("b1", 2, None),
        ];
        assert_eq!(resolve(&chain).unwrap().workflow.unwrap().workflow_id, "a");
    }

    #[test]
    fn no_failure_means_no_root_cause() {
        assert!(resolve(&[node("root", 0, None)]).is_none());
        assert!(resolve(&[]).is_none());
    }

    #[test]
    fn kind_mapping() {
        let f = |source, outcome| FailureDescriptor {
            source,
            outcome,
            message: String::new(),
            failure_type: None,
            activity: None,
            timestamp: None,
        };
        assert_eq!(
            classify(&f(FailureSource::ChildWorkflow, FailureOutcome::Failed)),
            RootCauseKind::ChildWorkflowFailed
        );
        assert_eq!(
            classify(&f(FailureSource::Activity, FailureOutcome::Terminated)),
            RootCauseKind::Canceled
        );
        assert_eq!(
            classify(&f(FailureSource::Unreachable, FailureOutcome::Failed)),
            RootCauseKind::Unknown
        );
    }
}
