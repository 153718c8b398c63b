//! Mermaid diagram generation.

use hs_core::failures::FailuresResult;
use hs_core::lifecycle::Category;
use hs_core::timeline::{TimelineEvent, TimelineResult};
use hs_core::trace::{ChainNode, RootCause, TraceResult};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Failures flowcharts show at most this many entries.
const MAX_FAILURE_ENTRIES: usize = 10;

/// Flowchart of the chain, parent to child, with the root cause attached.
pub fn trace_to_mermaid(result: &TraceResult) -> String {
    if result.chain.is_empty() {
        return "graph TD\n    A[No workflows in chain]".to_string();
    }

    let mut out = String::from("graph TD\n");
    for (i, node) in result.chain.iter().enumerate() {
        let _ = writeln!(out, "    W{i}[{}]{}", node_label(node), node_class(node));
    }

    // Edges follow depth: each node hangs off the nearest earlier node one level up.
    for (i, node) in result.chain.iter().enumerate().skip(1) {
        let Some(parent) = result.chain[..i]
            .iter()
            .rposition(|p| p.depth + 1 == node.depth)
        else {
            continue;
        };
        if node.status.is_unsuccessful() {
            let _ = writeln!(out, "    W{parent} -->|failed| W{i}");
        } else {
            let _ = writeln!(out, "    W{parent} --> W{i}");
        }
    }

    if let Some(rc) = &result.root_cause {
        let holder = rc
            .workflow
            .as_ref()
            .and_then(|wf| result.chain.iter().position(|n| &n.execution == wf))
            .unwrap_or(result.chain.len() - 1);
        let _ = writeln!(out, "    RC((({})))", root_cause_label(rc));
        let _ = writeln!(out, "    W{holder} -.->|root cause| RC");
        out.push_str("    style RC fill:#ff6b6b,stroke:#c92a2a,color:#fff\n");
    }
    out
}

/// Sequence diagram between the workflow and its activities, children and timers.
pub fn timeline_to_mermaid(result: &TimelineResult) -> String {
    if result.events.is_empty() {
        return "sequenceDiagram\n    Note over Workflow: No events".to_string();
    }

    let mut participants = BTreeSet::new();
    for event in &result.events {
        let p = participant(event);
        if p != "Workflow" {
            participants.insert(p);
        }
    }

    let mut out = String::from("sequenceDiagram\n    participant Workflow\n");
    for p in &participants {
        let _ = writeln!(out, "    participant {p}");
    }
    for event in &result.events {
        if let Some(line) = sequence_line(event) {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}

/// Pie chart when grouped, otherwise a flowchart of root → leaf → cause.
pub fn failures_to_mermaid(result: &FailuresResult) -> String {
    if result.failures.is_empty() && result.groups.is_empty() {
        return "graph TD\n    A[No failures found]".to_string();
    }

    if let Some(by) = result.grouped_by {
        let mut out = format!("pie title Failures by {}\n", by.as_str());
        for group in &result.groups {
            let _ = writeln!(out, "    {:?} : {}", truncate(&group.key, 30), group.count);
        }
        return out;
    }

    let mut out = String::from("graph LR\n");
    for (i, failure) in result.failures.iter().enumerate() {
        if i >= MAX_FAILURE_ENTRIES {
            let _ = writeln!(
                out,
                "    MORE[+{} more...]",
                result.failures.len() - MAX_FAILURE_ENTRIES
            );
            break;
        }
        let cause = failure
            .root_cause
            .as_ref()
            .map(|rc| rc.summary())
            .unwrap_or_else(|| "no root cause".to_string());
        let _ = writeln!(
            out,
            "    F{i}_root[{}]",
            truncate(&failure.root_workflow.workflow_id, 15)
        );
        let _ = writeln!(out, "    F{i}_rc(({}))", escape(&truncate(&cause, 25)));
        match &failure.leaf_failure {
            Some(leaf) if failure.depth > 0 && leaf.workflow_id != failure.root_workflow.workflow_id => {
                let _ = writeln!(out, "    F{i}_leaf[{}]", truncate(&leaf.workflow_id, 15));
                let _ = writeln!(out, "    F{i}_root -->|depth {}| F{i}_leaf", failure.depth);
                let _ = writeln!(out, "    F{i}_leaf -.-> F{i}_rc");
            }
            _ => {
                let _ = writeln!(out, "    F{i}_root -.-> F{i}_rc");
            }
        }
    }
    out
}

fn node_label(node: &ChainNode) -> String {
    let workflow_type = node.workflow_type.as_deref().unwrap_or("Workflow");
    let mut label = format!("{}<br/>{}", escape(&truncate(workflow_type, 20)), node.status);
    if node.is_leaf {
        label.push_str("<br/>LEAF");
    }
    label
}

fn node_class(node: &ChainNode) -> &'static str {
    use hs_core::execution::WorkflowStatus::*;
    match node.status {
        Failed | TimedOut => ":::failed",
        Completed => ":::success",
        Running => ":::running",
        _ => "",
    }
}

fn root_cause_label(rc: &RootCause) -> String {
    match &rc.activity {
        Some(activity) => format!("{}<br/>{}", escape(activity), escape(&truncate(&rc.error, 30))),
        None => escape(&truncate(&rc.error, 40)),
    }
}

fn participant(event: &TimelineEvent) -> String {
    match (event.category, &event.name) {
        (Category::Timer, _) => "Timer".to_string(),
        (Category::Activity | Category::ChildWorkflow, Some(name)) => sanitize_participant(name),
        _ => "Workflow".to_string(),
    }
}

fn sequence_line(event: &TimelineEvent) -> Option<String> {
    let p = participant(event);
    let kind = event.event_type.as_str();
    let workflow = event.category == Category::Workflow;

    if kind.contains("Scheduled") || kind.contains("Started") || kind.contains("Initiated") {
        if workflow {
            return Some(format!("Note over Workflow: {kind}"));
        }
        if event.category == Category::Timer {
            return Some(format!("Workflow->>Timer: Start {}", event.name.as_deref().unwrap_or("")));
        }
        if kind.contains("Started") {
            return None;
        }
        return Some(format!("Workflow->>+{p}: Start"));
    }
    if kind.contains("Completed") {
        if workflow {
            return Some("Note over Workflow: Completed".to_string());
        }
        return Some(format!("{p}-->>-Workflow: Done"));
    }
    if kind.contains("Failed") {
        let err = event
            .error
            .as_deref()
            .map(|e| escape(&truncate(e, 30)))
            .unwrap_or_else(|| "failed".to_string());
        if workflow {
            return Some(format!("Note over Workflow: Failed: {err}"));
        }
        return Some(format!("{p}--x Workflow: {err}"));
    }
    if kind.contains("TimedOut") {
        if workflow {
            return Some("Note over Workflow: Timed out".to_string());
        }
        return Some(format!("{p}--x Workflow: Timeout"));
    }
    if kind.contains("Fired") {
        return Some(format!(
            "Timer-->>Workflow: Fired {}",
            event.name.as_deref().unwrap_or("")
        ));
    }
    if kind.contains("Signaled") {
        return Some(format!(
            "Note over Workflow: Signal {}",
            event.name.as_deref().unwrap_or("")
        ));
    }
    None
}

/// Mermaid participant IDs allow no spaces or punctuation.
fn sanitize_participant(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(20)
        .collect()
}

/// Characters that break Mermaid node labels.
fn escape(s: &str) -> String {
    s.replace(['[', ']', '(', ')', '{', '}', '"', '|'], " ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::execution::{ExecutionRef, WorkflowStatus};
    use hs_core::failures::{FailureGroup, GroupBy};
    use hs_core::trace::RootCauseKind;

    fn node(id: &str, depth: u32, status: WorkflowStatus, leaf: bool) -> ChainNode {
        ChainNode {
            execution: ExecutionRef::new("default", id),
            workflow_type: Some("OrderWorkflow".into()),
            depth,
            status,
            is_leaf: leaf,
            start_time: None,
            close_time: None,
            duration_ms: None,
            failure: None,
        }
    }

    #[test]
    fn trace_flowchart_links_parent_child_and_root_cause() {
        let result = TraceResult {
            chain: vec![
                node("order-1", 0, WorkflowStatus::Failed, false),
                node("payment-1", 1, WorkflowStatus::Failed, true),
            ],
            root_cause: Some(RootCause {
                kind: RootCauseKind::WorkflowFailed,
                error: "payment declined".into(),
                activity: None,
                timestamp: None,
                workflow: Some(ExecutionRef::new("default", "payment-1")),
            }),
            depth: 1,
        };
        let out = trace_to_mermaid(&result);
        assert!(out.starts_with("graph TD\n"));
        assert!(out.contains("W0 -->|failed| W1"));
        assert!(out.contains("RC(((payment declined)))"));
        assert!(out.contains("W1 -.->|root cause| RC"));
        assert!(out.contains("LEAF"));
    }

    #[test]
    fn grouped_failures_render_as_pie() {
        let result = FailuresResult {
            failures: vec![],
            groups: vec![FailureGroup {
                key: "OrderWorkflow".into(),
                count: 3,
                percentage: 100.0,
                sample: None,
                first_seen: None,
                last_seen: None,
            }],
            total_count: 3,
            query: String::new(),
            grouped_by: Some(GroupBy::Type),
        };
        let out = failures_to_mermaid(&result);
        assert!(out.starts_with("pie title Failures by type\n"));
        assert!(out.contains("\"OrderWorkflow\" : 3"));
    }

    #[test]
    fn empty_documents() {
        let empty = FailuresResult {
            failures: vec![],
            groups: vec![],
            total_count: 0,
            query: String::new(),
            grouped_by: None,
        };
        assert_eq!(failures_to_mermaid(&empty), "graph TD\n    A[No failures found]");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(sanitize_participant("charge-card.v2"), "charge_card_v2");
    }
}
