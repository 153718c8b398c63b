//! Command-line arguments.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use hs_analysis::OutputFormat;
use hs_core::execution::WorkflowStatus;
use hs_core::failures::GroupBy;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "histscope",
    about = "Timelines, failure chains and failure reports from workflow histories",
    version
)]
pub(crate) struct Cli {
    #[arg(long, env = "HISTSCOPE_DB", help = "History database path")]
    pub(crate) db: Option<PathBuf>,

    #[arg(long, env = "HISTSCOPE_CONFIG", help = "Analysis config file (JSON)")]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long,
        default_value = "json",
        value_parser = parse_format,
        help = "Output format: json, jsonl, text or mermaid"
    )]
    pub(crate) format: OutputFormat,

    #[arg(long, short = 'n', default_value = "default", help = "Namespace of the execution")]
    pub(crate) namespace: String,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Chronological events of one execution.
    Timeline(TimelineArgs),
    /// Follow failed child workflows down to the root cause.
    Trace(TraceArgs),
    /// Failing executions in a time window, each traced to its root cause.
    Failures(FailuresArgs),
    /// Load history JSON documents into the database.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ExecutionArgs {
    #[arg(help = "Workflow ID")]
    pub(crate) workflow_id: String,

    #[arg(long, short = 'r', help = "Run ID (default: latest run)")]
    pub(crate) run_id: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct TimelineArgs {
    #[command(flatten)]
    pub(crate) execution: ExecutionArgs,

    #[arg(long, help = "Only milestones plus the first and terminal transition of each lifecycle")]
    pub(crate) compact: bool,

    #[arg(long, value_delimiter = ',', help = "Event types or categories to keep")]
    pub(crate) include: Vec<String>,

    #[arg(long, value_delimiter = ',', help = "Event types or categories to drop")]
    pub(crate) exclude: Vec<String>,

    #[arg(long, help = "Show every activity attempt instead of folding retries")]
    pub(crate) per_attempt: bool,
}

#[derive(Debug, Args)]
pub(crate) struct TraceArgs {
    #[command(flatten)]
    pub(crate) execution: ExecutionArgs,

    #[arg(long, help = "Deepest child depth to visit (0 = root only)")]
    pub(crate) max_depth: Option<u32>,

    #[arg(long, help = "Maximum executions in the chain")]
    pub(crate) max_nodes: Option<usize>,

    #[arg(long, value_delimiter = ',', help = "Namespaces children may be followed into")]
    pub(crate) follow_namespaces: Vec<String>,
}

#[derive(Debug, Args)]
pub(crate) struct FailuresArgs {
    #[arg(
        long,
        value_parser = parse_since,
        help = "Closed after this instant: a duration ago (\"1h\", \"2d\") or RFC 3339"
    )]
    pub(crate) since: Option<DateTime<Utc>>,

    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_status,
        help = "Statuses to match (default: Failed,TimedOut)"
    )]
    pub(crate) status: Vec<WorkflowStatus>,

    #[arg(long = "filter", help = "Attribute equality, Key=Value; repeatable")]
    pub(crate) filters: Vec<String>,

    #[arg(long, help = "Maximum executions to analyze")]
    pub(crate) limit: Option<usize>,

    #[arg(long, help = "Keep entries whose root cause contains this text")]
    pub(crate) error_contains: Option<String>,

    #[arg(long, help = "Drop parents that failed because of a child")]
    pub(crate) leaf_only: bool,

    #[arg(long, help = "Strip wrapper context from error messages")]
    pub(crate) compact_errors: bool,

    #[arg(
        long,
        default_value = "none",
        value_parser = parse_group_by,
        help = "Group by: none, type, namespace, status or error"
    )]
    pub(crate) group_by: GroupBy,

    #[arg(long, help = "Parallel chain builds")]
    pub(crate) workers: Option<usize>,

    #[arg(long, help = "Search every namespace instead of --namespace")]
    pub(crate) all_namespaces: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ImportArgs {
    #[arg(required = true, help = "History JSON files")]
    pub(crate) files: Vec<PathBuf>,
}

fn parse_format(raw: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(raw).ok_or_else(|| format!("unknown format '{raw}'"))
}

fn parse_status(raw: &str) -> Result<WorkflowStatus, String> {
    WorkflowStatus::parse(raw.trim()).ok_or_else(|| format!("unknown status '{raw}'"))
}

fn parse_group_by(raw: &str) -> Result<GroupBy, String> {
    GroupBy::parse(raw).ok_or_else(|| format!("unknown grouping '{raw}'"))
}

/// A humantime duration before now, or an absolute RFC 3339 instant.
pub(crate) fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ago) = humantime::parse_duration(raw) {
        let ago = chrono::Duration::from_std(ago).map_err(|e| e.to_string())?;
        return Ok(Utc::now() - ago);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| format!("'{raw}' is neither a duration nor an RFC 3339 time"))
}
