//! Search query API: visibility predicates over executions.

use crate::HistoryError;
use chrono::{DateTime, SecondsFormat, Utc};
use hs_core::execution::{ExecutionInfo, WorkflowStatus};

/// `Key = "Value"` equality on a visibility attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub key: String,
    pub value: String,
}

impl AttributeFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse `Key=Value`. Surrounding quotes on the value are stripped.
    pub fn parse(raw: &str) -> Result<Self, HistoryError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| HistoryError::InvalidQuery(format!("expected Key=Value, got {raw:?}")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(HistoryError::InvalidQuery(format!("empty key in {raw:?}")));
        }
        let value = value.trim().trim_matches('"');
        Ok(Self::new(key, value))
    }

    /// Value of this filter's key on `info`, if the key is known there.
    fn lookup<'a>(&self, info: &'a ExecutionInfo) -> Option<&'a str> {
        match self.key.as_str() {
            "WorkflowType" => info.workflow_type.as_deref(),
            "WorkflowId" => Some(info.execution.workflow_id.as_str()),
            "RunId" => info.execution.run_id.as_deref(),
            "Namespace" => Some(info.execution.namespace.as_str()),
            "ExecutionStatus" => Some(info.status.as_str()),
            other => info.search_attributes.get(other).map(|s| s.as_str()),
        }
    }

    pub fn matches(&self, info: &ExecutionInfo) -> bool {
        self.lookup(info) == Some(self.value.as_str())
    }
}

/// Query parameters for an execution search.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub namespace: Option<String>,
    /// Any-of status filter. Empty = every status.
    pub statuses: Vec<WorkflowStatus>,
    /// Only executions closed strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    pub filters: Vec<AttributeFilter>,
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Render the predicate in visibility-query syntax.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();

        if !self.statuses.is_empty() {
            let statuses: Vec<String> = self
                .statuses
                .iter()
                .map(|s| format!("ExecutionStatus = {:?}", s.as_str()))
                .collect();
            parts.push(format!("({})", statuses.join(" OR ")));
        }

        if let Some(since) = self.since {
            parts.push(format!(
                "CloseTime > {:?}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        for filter in &self.filters {
            parts.push(format!("{} = {:?}", filter.key, filter.value));
        }

        parts.join(" AND ")
    }

    /// Evaluate the predicate against one visibility row.
    pub fn matches(&self, info: &ExecutionInfo) -> bool {
        if let Some(ns) = &self.namespace {
            if &info.execution.namespace != ns {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&info.status) {
            return false;
        }
        if let Some(since) = self.since {
            match info.close_time {
                Some(closed) if closed > since => {}
                _ => return false,
            }
        }
        self.filters.iter().all(|f| f.matches(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hs_core::execution::ExecutionRef;

    fn info(status: WorkflowStatus, closed_hour: u32) -> ExecutionInfo {
        ExecutionInfo {
            execution: ExecutionRef::new("default", "order-1").with_run("r1"),
            workflow_type: Some("OrderWorkflow".into()),
            status,
            start_time: None,
            close_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, closed_hour, 0, 0).unwrap()),
            search_attributes: [("CustomerId".to_string(), "c-9".to_string())].into(),
        }
    }

    #[test]
    fn query_string_combines_parts() {
        let req = SearchRequest {
            statuses: vec![WorkflowStatus::Failed, WorkflowStatus::TimedOut],
            since: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            filters: vec![AttributeFilter::new("WorkflowType", "OrderWorkflow")],
            ..Default::default()
        };
        assert_eq!(
            req.to_query_string(),
            r#"(ExecutionStatus = "Failed" OR ExecutionStatus = "TimedOut") AND CloseTime > "2024-01-01T00:00:00Z" AND WorkflowType = "OrderWorkflow""#
        );
    }

    #[test]
    fn matches_status_window_and_attributes() {
        let req = SearchRequest {
            statuses: vec![WorkflowStatus::Failed],
            since: Some(Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap()),
            filters: vec![AttributeFilter::parse("CustomerId=\"c-9\"").unwrap()],
            ..Default::default()
        };
        assert!(req.matches(&info(WorkflowStatus::Failed, 6)));
        assert!(!req.matches(&info(WorkflowStatus::Failed, 4)));
        assert!(!req.matches(&info(WorkflowStatus::Completed, 6)));

        let other = SearchRequest {
            filters: vec![AttributeFilter::new("CustomerId", "c-1")],
            ..Default::default()
        };
        assert!(!other.matches(&info(WorkflowStatus::Failed, 6)));
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(AttributeFilter::parse("WorkflowType").is_err());
        assert!(AttributeFilter::parse("=x").is_err());
    }
}
