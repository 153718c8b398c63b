//! Chain walker: depth-first traversal of parent → child executions.

use crate::cancel::CancellationToken;
use crate::correlator::{correlate, Correlation};
use crate::timeout::with_timeout;
use crate::AnalysisError;
use hs_core::config::AnalysisConfig;
use hs_core::event::History;
use hs_core::execution::{ExecutionRef, WorkflowStatus};
use hs_core::lifecycle::{Category, LifecycleRecord, LifecycleStatus};
use hs_core::trace::{ChainNode, FailureDescriptor, FailureOutcome, FailureSource};
use hs_history::{HistoryError, HistorySource};

/// Pending visit on the walk stack.
struct Visit {
    execution: ExecutionRef,
    depth: u32,
}

/// Walk the chain rooted at `root` in pre-order.
///
/// The root must be fetchable; descendants that cannot be fetched become
/// leaf nodes with an `Unreachable` failure. Traversal never visits a node
/// deeper than `max_depth` and stops after `max_nodes` nodes. The root is
/// always fetched, whatever the node limit.
pub async fn build_chain(
    source: &dyn HistorySource,
    root: &ExecutionRef,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Vec<ChainNode>, AnalysisError> {
    let mut chain: Vec<ChainNode> = Vec::new();
    // Index of each node's parent in `chain`.
    let mut parents: Vec<Option<usize>> = Vec::new();
    let mut stack: Vec<(Visit, Option<usize>)> = vec![(
        Visit {
            execution: root.clone(),
            depth: 0,
        },
        None,
    )];

    while let Some((visit, parent)) = stack.pop() {
        if !chain.is_empty() && chain.len() >= config.max_nodes {
            tracing::debug!(root = %root, max_nodes = config.max_nodes, "node limit reached");
            break;
        }

        let fetched = cancel
            .run(with_timeout(
                config.fetch_timeout_ms,
                source.fetch_history(&visit.execution),
            ))
            .await?;

        let history = match fetched {
            Ok(history) => history,
            Err(e) if parent.is_none() => return Err(root_error(root, e)),
            Err(e) => {
                tracing::warn!(execution = %visit.execution, error = %e, "descendant history unavailable");
                chain.push(unreachable_node(visit, &e));
                parents.push(parent);
                continue;
            }
        };
        tracing::debug!(execution = %history.execution, events = history.events.len(), "fetched history");

        let correlation = correlate(&history.events, config.per_attempt);
        let index = chain.len();
        chain.push(analyze_node(&history, &correlation, visit.depth));
        parents.push(parent);

        if visit.depth >= config.max_depth {
            continue;
        }
        let children = follow_targets(&correlation, &history.execution, root, config);
        // Reverse so the first child is visited first.
        for child in children.into_iter().rev() {
            stack.push((
                Visit {
                    execution: child,
                    depth: visit.depth + 1,
                },
                Some(index),
            ));
        }
    }

    for (i, node) in chain.iter_mut().enumerate() {
        node.is_leaf = !parents.iter().any(|p| *p == Some(i));
    }
    Ok(chain)
}

fn root_error(root: &ExecutionRef, e: HistoryError) -> AnalysisError {
    match e {
        HistoryError::NotFound(_) => AnalysisError::NotFound(root.to_string()),
        other => AnalysisError::Fetch(format!("{root}: {other}")),
    }
}

/// Child executions of this node the walker may enter, in correlation order.
fn follow_targets(
    correlation: &Correlation,
    parent: &ExecutionRef,
    root: &ExecutionRef,
    config: &AnalysisConfig,
) -> Vec<ExecutionRef> {
    correlation
        .children()
        .filter_map(|record| record.child.clone())
        .map(|mut child| {
            if child.namespace.is_empty() {
                child.namespace = parent.namespace.clone();
            }
            child
        })
        .filter(|child| {
            let allowed = config.can_follow(&child.namespace, &root.namespace);
            if !allowed {
                tracing::debug!(child = %child, "namespace not followed");
            }
            allowed
        })
        .collect()
}

fn unreachable_node(visit: Visit, error: &HistoryError) -> ChainNode {
    ChainNode {
        execution: visit.execution,
        workflow_type: None,
        depth: visit.depth,
        status: WorkflowStatus::Unknown,
        is_leaf: true,
        start_time: None,
        close_time: None,
        duration_ms: None,
        failure: Some(FailureDescriptor {
            source: FailureSource::Unreachable,
            outcome: FailureOutcome::Unknown,
            message: format!("history unavailable: {error}"),
            failure_type: None,
            activity: None,
            timestamp: None,
        }),
    }
}

/// Build the node for one fetched execution. `is_leaf` is settled by the
/// walker once the whole chain is known.
pub fn analyze_node(history: &History, correlation: &Correlation, depth: u32) -> ChainNode {
    let info = history.execution_info();
    let failure = if info.status.is_unsuccessful() {
        node_failure(correlation, info.status)
    } else {
        None
    };
    ChainNode {
        execution: history.execution.clone(),
        workflow_type: info.workflow_type,
        depth,
        status: info.status,
        is_leaf: true,
        start_time: info.start_time,
        close_time: info.close_time,
        duration_ms: match (info.start_time, info.close_time) {
            (Some(start), Some(close)) => Some((close - start).num_milliseconds()),
            _ => None,
        },
        failure,
    }
}

/// Most causal failure visible in one execution: a failed activity, then a
/// failed child, then the workflow's own terminal milestone.
fn node_failure(correlation: &Correlation, status: WorkflowStatus) -> Option<FailureDescriptor> {
    let failed = |category: Category| {
        correlation
            .records
            .values()
            .find(|r| r.category == category && r.status.is_failure())
    };

    if let Some(record) = failed(Category::Activity) {
        return Some(record_failure(record, FailureSource::Activity));
    }
    if let Some(record) = failed(Category::ChildWorkflow) {
        return Some(record_failure(record, FailureSource::ChildWorkflow));
    }

    let milestone = correlation.last_milestone();
    let failure = milestone.and_then(|e| e.failure());
    let message = match (&failure, status) {
        (Some(f), _) => f.message.clone(),
        (None, WorkflowStatus::TimedOut) => "workflow execution timed out".to_string(),
        (None, _) => milestone
            .and_then(|e| e.attr_str("reason"))
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("workflow {}", status.as_str().to_lowercase())),
    };
    Some(FailureDescriptor {
        source: FailureSource::Workflow,
        outcome: workflow_outcome(status),
        message,
        failure_type: failure.and_then(|f| f.failure_type),
        activity: None,
        timestamp: milestone.map(|e| e.timestamp),
    })
}

fn record_failure(record: &LifecycleRecord, source: FailureSource) -> FailureDescriptor {
    let failure = record.failure.clone();
    FailureDescriptor {
        source,
        outcome: lifecycle_outcome(record.status),
        message: failure
            .as_ref()
            .map(|f| f.message.clone())
            .unwrap_or_default(),
        failure_type: failure.and_then(|f| f.failure_type),
        activity: match source {
            FailureSource::Activity => record.name.clone(),
            _ => None,
        },
        timestamp: record.closed_at,
    }
}

fn lifecycle_outcome(status: LifecycleStatus) -> FailureOutcome {
    match status {
        LifecycleStatus::Failed => FailureOutcome::Failed,
        LifecycleStatus::TimedOut => FailureOutcome::TimedOut,
        LifecycleStatus::Canceled => FailureOutcome::Canceled,
        LifecycleStatus::Terminated => FailureOutcome::Terminated,
        _ => FailureOutcome::Unknown,
    }
}

fn workflow_outcome(status: WorkflowStatus) -> FailureOutcome {
    match status {
        WorkflowStatus::Failed => FailureOutcome::Failed,
        WorkflowStatus::TimedOut => FailureOutcome::TimedOut,
        WorkflowStatus::Canceled => FailureOutcome::Canceled,
        WorkflowStatus::Terminated => FailureOutcome::Terminated,
        _ => FailureOutcome::Unknown,
    }
}
