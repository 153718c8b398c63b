//! SQLite-backed history storage.

use crate::{HistoryError, HistorySource, SearchRequest, SearchSource};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hs_core::event::{History, RawEvent};
use hs_core::execution::{ExecutionInfo, ExecutionRef, WorkflowStatus};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// History store backed by a single SQLite database.
/// Uses Mutex<Connection> for thread safety (rusqlite::Connection is !Sync).
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database at the given path.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory history store (useful for testing).
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), HistoryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS executions (
                namespace TEXT NOT NULL,
                workflow_id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                workflow_type TEXT,
                status TEXT NOT NULL,
                start_time TEXT,
                close_time TEXT,
                search_attributes_json TEXT NOT NULL,
                PRIMARY KEY (namespace, workflow_id, run_id)
            );

            CREATE TABLE IF NOT EXISTS events (
                namespace TEXT NOT NULL,
                workflow_id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                sequence_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                attributes_json TEXT NOT NULL,
                PRIMARY KEY (namespace, workflow_id, run_id, sequence_id)
            );

            CREATE INDEX IF NOT EXISTS idx_executions_close
                ON executions(close_time);",
        )
        .map_err(|e| HistoryError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Store a history and its visibility row. Re-importing a run replaces it
    /// and makes it the latest run of its workflow.
    pub fn import(&self, history: &History) -> Result<ExecutionInfo, HistoryError> {
        let run_id = history
            .execution
            .run_id
            .clone()
            .ok_or_else(|| HistoryError::Malformed(format!("{} has no run id", history.execution)))?;
        let info = history.execution_info();
        let attributes = serde_json::to_string(&info.search_attributes)
            .map_err(|e| HistoryError::Malformed(e.to_string()))?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        let ns = &history.execution.namespace;
        let wf = &history.execution.workflow_id;
        tx.execute(
            "DELETE FROM executions WHERE namespace = ?1 AND workflow_id = ?2 AND run_id = ?3",
            rusqlite::params![ns, wf, run_id],
        )
        .map_err(|e| HistoryError::Storage(e.to_string()))?;
        tx.execute(
            "DELETE FROM events WHERE namespace = ?1 AND workflow_id = ?2 AND run_id = ?3",
            rusqlite::params![ns, wf, run_id],
        )
        .map_err(|e| HistoryError::Storage(e.to_string()))?;
        tx.execute(
            "INSERT INTO executions (
                namespace, workflow_id, run_id, workflow_type, status,
                start_time, close_time, search_attributes_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                ns,
                wf,
                run_id,
                info.workflow_type,
                info.status.as_str(),
                info.start_time.map(format_ts),
                info.close_time.map(format_ts),
                attributes,
            ],
        )
        .map_err(|e| HistoryError::Storage(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO events (
                        namespace, workflow_id, run_id, sequence_id,
                        kind, timestamp, attributes_json
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| HistoryError::Storage(e.to_string()))?;
            for event in &history.events {
                stmt.execute(rusqlite::params![
                    ns,
                    wf,
                    run_id,
                    event.sequence_id,
                    event.kind,
                    format_ts(event.timestamp),
                    event.attributes.to_string(),
                ])
                .map_err(|e| HistoryError::Storage(format!("event {}: {e}", event.sequence_id)))?;
            }
        }

        tx.commit()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        tracing::debug!(execution = %history.execution, events = history.events.len(), "imported history");
        Ok(info)
    }

    /// Resolve the run to read: the given one, or the most recently imported.
    fn resolve_run(
        conn: &Connection,
        execution: &ExecutionRef,
    ) -> Result<Option<String>, HistoryError> {
        let sql = match execution.run_id {
            Some(_) => {
                "SELECT run_id FROM executions
                 WHERE namespace = ?1 AND workflow_id = ?2 AND run_id = ?3"
            }
            None => {
                "SELECT run_id FROM executions
                 WHERE namespace = ?1 AND workflow_id = ?2 AND ?3 IS NULL
                 ORDER BY rowid DESC LIMIT 1"
            }
        };
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let mut rows = stmt
            .query_map(
                rusqlite::params![execution.namespace, execution.workflow_id, execution.run_id],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| HistoryError::Storage(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// Load the full history of one execution.
    pub fn load(&self, execution: &ExecutionRef) -> Result<History, HistoryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let run_id = Self::resolve_run(&conn, execution)?
            .ok_or_else(|| HistoryError::NotFound(execution.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT sequence_id, kind, timestamp, attributes_json
                 FROM events
                 WHERE namespace = ?1 AND workflow_id = ?2 AND run_id = ?3
                 ORDER BY sequence_id ASC",
            )
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![execution.namespace, execution.workflow_id, run_id],
                |row| {
                    Ok(RawEventRow {
                        sequence_id: row.get(0)?,
                        kind: row.get(1)?,
                        timestamp: row.get(2)?,
                        attributes_json: row.get(3)?,
                    })
                },
            )
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        let mut events = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| HistoryError::Storage(e.to_string()))?;
            events.push(raw_to_event(raw)?);
        }

        Ok(History {
            execution: ExecutionRef {
                namespace: execution.namespace.clone(),
                workflow_id: execution.workflow_id.clone(),
                run_id: Some(run_id),
            },
            events,
        })
    }

    /// Visibility rows matching `request`, most recently closed first.
    pub fn query(&self, request: &SearchRequest) -> Result<Vec<ExecutionInfo>, HistoryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        let mut sql = String::from(
            "SELECT namespace, workflow_id, run_id, workflow_type, status,
                    start_time, close_time, search_attributes_json
             FROM executions WHERE 1 = 1",
        );
        let mut params: Vec<String> = Vec::new();
        if let Some(ns) = &request.namespace {
            params.push(ns.clone());
            sql.push_str(&format!(" AND namespace = ?{}", params.len()));
        }
        if let Some(since) = request.since {
            params.push(format_ts(since));
            sql.push_str(&format!(" AND close_time > ?{}", params.len()));
        }
        if !request.statuses.is_empty() {
            let mut slots = Vec::new();
            for status in &request.statuses {
                params.push(status.as_str().to_string());
                slots.push(format!("?{}", params.len()));
            }
            sql.push_str(&format!(" AND status IN ({})", slots.join(", ")));
        }
        sql.push_str(" ORDER BY close_time DESC, rowid DESC");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok(RawExecutionRow {
                    namespace: row.get(0)?,
                    workflow_id: row.get(1)?,
                    run_id: row.get(2)?,
                    workflow_type: row.get(3)?,
                    status: row.get(4)?,
                    start_time: row.get(5)?,
                    close_time: row.get(6)?,
                    search_attributes_json: row.get(7)?,
                })
            })
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        let limit = request.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for row in rows {
            if out.len() >= limit {
                break;
            }
            let raw = row.map_err(|e| HistoryError::Storage(e.to_string()))?;
            let info = raw_to_execution(raw)?;
            // Attribute filters are evaluated here rather than in SQL.
            if request.matches(&info) {
                out.push(info);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl HistorySource for HistoryStore {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<History, HistoryError> {
        self.load(execution)
    }
}

#[async_trait]
impl SearchSource for HistoryStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ExecutionInfo>, HistoryError> {
        self.query(request)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(field: &str, raw: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HistoryError::Malformed(format!("{field}: {e}")))
}

/// Internal row structs for SQLite queries.
struct RawEventRow {
    sequence_id: i64,
    kind: String,
    timestamp: String,
    attributes_json: String,
}

struct RawExecutionRow {
    namespace: String,
    workflow_id: String,
    run_id: String,
    workflow_type: Option<String>,
    status: String,
    start_time: Option<String>,
    close_time: Option<String>,
    search_attributes_json: String,
}

fn raw_to_event(raw: RawEventRow) -> Result<RawEvent, HistoryError> {
    Ok(RawEvent {
        sequence_id: raw.sequence_id,
        kind: raw.kind,
        timestamp: parse_ts("timestamp", &raw.timestamp)?,
        attributes: serde_json::from_str(&raw.attributes_json)
            .map_err(|e| HistoryError::Malformed(format!("attributes_json: {e}")))?,
    })
}

fn raw_to_execution(raw: RawExecutionRow) -> Result<ExecutionInfo, HistoryError> {
    let search_attributes: BTreeMap<String, String> =
        serde_json::from_str(&raw.search_attributes_json)
            .map_err(|e| HistoryError::Malformed(format!("search_attributes_json: {e}")))?;
    Ok(ExecutionInfo {
        execution: ExecutionRef {
            namespace: raw.namespace,
            workflow_id: raw.workflow_id,
            run_id: Some(raw.run_id),
        },
        workflow_type: raw.workflow_type,
        status: WorkflowStatus::parse(&raw.status).unwrap_or(WorkflowStatus::Unknown),
        start_time: raw
            .start_time
            .as_deref()
            .map(|s| parse_ts("start_time", s))
            .transpose()?,
        close_time: raw
            .close_time
            .as_deref()
            .map(|s| parse_ts("close_time", s))
            .transpose()?,
        search_attributes,
    })
}
