//! Output renderers for the three result documents.

use crate::mermaid;
use hs_core::failures::FailuresResult;
use hs_core::timeline::TimelineResult;
use hs_core::trace::TraceResult;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    /// One JSON record per line.
    Jsonl,
    Text,
    Mermaid,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "jsonl" | "ndjson" => Some(OutputFormat::Jsonl),
            "text" | "txt" => Some(OutputFormat::Text),
            "mermaid" | "mmd" => Some(OutputFormat::Mermaid),
            _ => None,
        }
    }
}

/// A result document that can be printed in every [`OutputFormat`].
pub trait Render: Serialize {
    /// Records emitted one per line in JSONL mode.
    fn jsonl_records(&self) -> Result<Vec<String>, serde_json::Error>;
    fn to_text(&self) -> String;
    fn to_mermaid(&self) -> String;
}

pub fn render<T: Render>(doc: &T, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(doc),
        OutputFormat::Jsonl => Ok(doc.jsonl_records()?.join("\n")),
        OutputFormat::Text => Ok(doc.to_text()),
        OutputFormat::Mermaid => Ok(doc.to_mermaid()),
    }
}

fn lines<T: Serialize>(items: &[T]) -> Result<Vec<String>, serde_json::Error> {
    items.iter().map(serde_json::to_string).collect()
}

fn ts(t: Option<chrono::DateTime<chrono::Utc>>) -> String {
    t.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

impl Render for TimelineResult {
    fn jsonl_records(&self) -> Result<Vec<String>, serde_json::Error> {
        lines(&self.events)
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Workflow: {} ({})",
            self.workflow,
            self.workflow_type.as_deref().unwrap_or("unknown type")
        );
        let _ = writeln!(out, "Status:   {}", self.status);
        if let Some(ms) = self.duration_ms {
            let _ = writeln!(out, "Duration: {ms}ms");
        }
        let _ = writeln!(out, "Events:   {} of {}", self.events.len(), self.event_count);
        out.push('\n');
        for e in &self.events {
            let _ = write!(
                out,
                "{}  #{:<4} {:<14} {}",
                ts(Some(e.timestamp)),
                e.event_id,
                e.category.as_str(),
                e.event_type
            );
            if let Some(status) = &e.status {
                let _ = write!(out, "  [{status}]");
            }
            if let Some(name) = &e.name {
                let _ = write!(out, "  {name}");
            }
            if let Some(retries) = e.retry_count {
                let _ = write!(out, "  retries={retries}");
            }
            if let Some(ms) = e.duration_ms {
                let _ = write!(out, "  {ms}ms");
            }
            if let Some(err) = &e.error {
                let _ = write!(out, "  error: {err}");
            }
            out.push('\n');
        }
        out
    }

    fn to_mermaid(&self) -> String {
        mermaid::timeline_to_mermaid(self)
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

impl Render for TraceResult {
    fn jsonl_records(&self) -> Result<Vec<String>, serde_json::Error> {
        let mut records = lines(&self.chain)?;
        if let Some(rc) = &self.root_cause {
            records.push(serde_json::to_string(&serde_json::json!({ "root_cause": rc }))?);
        }
        Ok(records)
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        for node in &self.chain {
            let indent = "  ".repeat(node.depth as usize);
            let branch = if node.depth == 0 { "" } else { "└─ " };
            let _ = write!(
                out,
                "{indent}{branch}{} [{}] {}",
                node.execution,
                node.workflow_type.as_deref().unwrap_or("?"),
                node.status
            );
            if node.is_leaf {
                out.push_str(" (leaf)");
            }
            if let Some(f) = &node.failure {
                let _ = write!(out, " - {}", f.message);
            }
            out.push('\n');
        }
        match &self.root_cause {
            Some(rc) => {
                let _ = writeln!(out, "\nRoot cause: {}", rc.summary());
                if let Some(wf) = &rc.workflow {
                    let _ = writeln!(out, "Found in:   {wf}");
                }
            }
            None => out.push_str("\nNo root cause: no failure in chain\n"),
        }
        out
    }

    fn to_mermaid(&self) -> String {
        mermaid::trace_to_mermaid(self)
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

impl Render for FailuresResult {
    fn jsonl_records(&self) -> Result<Vec<String>, serde_json::Error> {
        if self.grouped_by.is_some() {
            lines(&self.groups)
        } else {
            lines(&self.failures)
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        if !self.query.is_empty() {
            let _ = writeln!(out, "Query: {}", self.query);
        }
        let _ = writeln!(out, "Total: {}\n", self.total_count);

        if let Some(by) = self.grouped_by {
            for g in &self.groups {
                let _ = writeln!(
                    out,
                    "{:>5}  {:>5.1}%  {}={}  (first {}, last {})",
                    g.count,
                    g.percentage,
                    by.as_str(),
                    g.key,
                    ts(g.first_seen),
                    ts(g.last_seen)
                );
            }
            return out;
        }

        for f in &self.failures {
            let _ = writeln!(
                out,
                "{}  {}  {}  depth={}",
                ts(f.close_time),
                f.root_workflow,
                f.status,
                f.depth
            );
            if let Some(rc) = &f.root_cause {
                let _ = writeln!(out, "    {}", rc.summary());
            }
        }
        out
    }

    fn to_mermaid(&self) -> String {
        mermaid::failures_to_mermaid(self)
    }
}
