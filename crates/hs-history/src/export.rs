//! History export: histories to and from JSON documents.

use crate::HistoryError;
use hs_core::event::History;

/// Export a history to a pretty-printed JSON string.
pub fn history_to_json(history: &History) -> Result<String, HistoryError> {
    serde_json::to_string_pretty(history).map_err(|e| HistoryError::Malformed(e.to_string()))
}

/// Parse a history document. Events must have strictly increasing
/// sequence IDs.
pub fn history_from_json(raw: &str) -> Result<History, HistoryError> {
    let history: History =
        serde_json::from_str(raw).map_err(|e| HistoryError::Malformed(e.to_string()))?;
    if let Some(pair) = history
        .events
        .windows(2)
        .find(|w| w[1].sequence_id <= w[0].sequence_id)
    {
        return Err(HistoryError::Malformed(format!(
            "sequence id {} follows {}",
            pair[1].sequence_id, pair[0].sequence_id
        )));
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HistoryBuilder;
    use hs_core::execution::ExecutionRef;

    #[test]
    fn export_then_parse() {
        let mut b = HistoryBuilder::new(ExecutionRef::new("default", "order-1").with_run("r1"));
        b.workflow_started("OrderWorkflow");
        b.workflow_completed();
        let history = b.build();

        let json = history_to_json(&history).unwrap();
        let parsed = history_from_json(&json).unwrap();
        assert_eq!(parsed.execution, history.execution);
        assert_eq!(parsed.events, history.events);
    }

    #[test]
    fn rejects_out_of_order_events() {
        let raw = r#"{
            "execution": {"namespace": "default", "workflow_id": "x", "run_id": "r1"},
            "events": [
                {"sequence_id": 2, "kind": "WorkflowExecutionStarted", "timestamp": "2024-01-01T00:00:00Z"},
                {"sequence_id": 1, "kind": "WorkflowExecutionCompleted", "timestamp": "2024-01-01T00:00:01Z"}
            ]
        }"#;
        assert!(matches!(
            history_from_json(raw),
            Err(HistoryError::Malformed(_))
        ));
    }
}
