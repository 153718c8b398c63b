//! Failures aggregation result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::ExecutionRef;
use crate::trace::{ChainNode, RootCause};

// ---------------------------------------------------------------------------
// FailureEntry: one search-matched execution with its chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub root_workflow: ExecutionRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,

    /// Status of the root workflow.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,

    /// Maximum depth of the chain.
    pub depth: u32,

    /// Execution holding the root cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_failure: Option<ExecutionRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<RootCause>,

    pub chain: Vec<ChainNode>,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    None,
    Type,
    Namespace,
    Status,
    Error,
}

impl GroupBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" | "" => Some(GroupBy::None),
            "type" => Some(GroupBy::Type),
            "namespace" => Some(GroupBy::Namespace),
            "status" => Some(GroupBy::Status),
            "error" => Some(GroupBy::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::None => "none",
            GroupBy::Type => "type",
            GroupBy::Namespace => "namespace",
            GroupBy::Status => "status",
            GroupBy::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureGroup {
    pub key: String,
    pub count: usize,
    pub percentage: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<FailureEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// FailuresResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailuresResult {
    /// Always present, possibly empty. Empty when grouped.
    pub failures: Vec<FailureEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<FailureGroup>,

    pub total_count: usize,

    /// Rendered search predicate.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_by: Option<GroupBy>,
}
