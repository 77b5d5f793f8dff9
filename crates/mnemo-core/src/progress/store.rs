//! Progress Event Store
//!
//! Persistent, append-only log of progress events with its own schema and
//! version table. Lives at its own path (or `:memory:`); composing it
//! into the same physical file as the chunk store is the caller's choice.
//!
//! Query results order by event timestamp with insertion order breaking
//! ties, so replaying a session's log is deterministic.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::storage::{Result, StoreError};

use super::event::{ProgressEvent, ProgressEventType, ProgressMetadata, ProgressMetrics};

// ============================================================================
// SCHEMA
// ============================================================================

const PROGRESS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS progress_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    timestamp INTEGER NOT NULL,
    session_key TEXT NOT NULL,
    agent_label TEXT NOT NULL,
    event_type TEXT NOT NULL,
    message TEXT NOT NULL,
    metrics TEXT NOT NULL DEFAULT '{}',
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_progress_session ON progress_events(session_key);
CREATE INDEX IF NOT EXISTS idx_progress_timestamp ON progress_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_progress_type ON progress_events(event_type);

CREATE TABLE IF NOT EXISTS progress_schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO progress_schema_version (version, applied_at)
VALUES (1, datetime('now'));
"#;

// ============================================================================
// QUERY & AGGREGATION TYPES
// ============================================================================

/// Criteria for querying the event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressQuery {
    /// Restrict to one session
    pub session_key: Option<String>,
    /// Restrict to these event types (empty = all)
    pub event_types: Vec<ProgressEventType>,
    /// Events at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Events before this time
    pub until: Option<DateTime<Utc>>,
    /// Result cap
    pub limit: Option<i64>,
}

/// Aggregated view of one session's log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressAggregate {
    /// Event counts by type
    pub counts_by_type: BTreeMap<String, i64>,
    /// Distinct tool names seen in TOOL_CALL metadata
    pub unique_tools: Vec<String>,
    /// First-to-last event window
    pub elapsed_ms: Option<i64>,
    /// Completion estimate in [0, 100]
    pub completion_percentage: f64,
}

// ============================================================================
// STORE
// ============================================================================

/// Persistent progress-event log
pub struct ProgressStore {
    conn: Mutex<Connection>,
}

impl ProgressStore {
    /// Open (or create) the store at `path` (`:memory:` supported)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let in_memory = path == Path::new(":memory:");

        let conn = if in_memory {
            let uri = format!(
                "file:mnemo-progress-{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            );
            Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path)
        }
        .map_err(|e| StoreError::Corrupt(format!("Cannot open progress database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(PROGRESS_SCHEMA)
            .map_err(|e| StoreError::Corrupt(format!("Progress schema failed: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Init("Progress store lock poisoned".into()))
    }

    /// Append an event to the log
    pub fn insert(&self, event: &ProgressEvent) -> Result<()> {
        let metrics = serde_json::to_string(&event.metrics)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metrics: {}", e)))?;
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metadata: {}", e)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO progress_events
                (event_id, timestamp, session_key, agent_label, event_type, message, metrics, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.event_id,
                event.timestamp.timestamp_millis(),
                event.session_key,
                event.agent_label,
                event.event_type.as_str(),
                event.message,
                metrics,
                metadata,
            ],
        )?;
        Ok(())
    }

    /// Fetch one event by id
    pub fn get(&self, event_id: &str) -> Result<Option<ProgressEvent>> {
        let conn = self.lock()?;
        let event = conn
            .query_row(
                "SELECT * FROM progress_events WHERE event_id = ?1",
                params![event_id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    /// Latest event for a session (by timestamp, then insertion order)
    pub fn latest_for_session(&self, session_key: &str) -> Result<Option<ProgressEvent>> {
        let conn = self.lock()?;
        let event = conn
            .query_row(
                "SELECT * FROM progress_events WHERE session_key = ?1
                 ORDER BY timestamp DESC, seq DESC LIMIT 1",
                params![session_key],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    /// Query the log by criteria, in timestamp order (insertion order
    /// breaking ties)
    pub fn query(&self, criteria: &ProgressQuery) -> Result<Vec<ProgressEvent>> {
        let mut sql = String::from("SELECT * FROM progress_events WHERE 1=1");
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(session_key) = &criteria.session_key {
            sql.push_str(&format!(" AND session_key = ?{}", bind.len() + 1));
            bind.push(Box::new(session_key.clone()));
        }
        if !criteria.event_types.is_empty() {
            let placeholders: Vec<String> = criteria
                .event_types
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", bind.len() + 1 + i))
                .collect();
            sql.push_str(&format!(" AND event_type IN ({})", placeholders.join(", ")));
            for event_type in &criteria.event_types {
                bind.push(Box::new(event_type.as_str().to_string()));
            }
        }
        if let Some(since) = criteria.since {
            sql.push_str(&format!(" AND timestamp >= ?{}", bind.len() + 1));
            bind.push(Box::new(since.timestamp_millis()));
        }
        if let Some(until) = criteria.until {
            sql.push_str(&format!(" AND timestamp < ?{}", bind.len() + 1));
            bind.push(Box::new(until.timestamp_millis()));
        }

        sql.push_str(" ORDER BY timestamp, seq");
        if let Some(limit) = criteria.limit {
            sql.push_str(&format!(" LIMIT ?{}", bind.len() + 1));
            bind.push(Box::new(limit));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = bind.iter().map(Box::as_ref).collect();
        let events = stmt
            .query_map(params.as_slice(), Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Full event list for one session
    pub fn events_for_session(&self, session_key: &str) -> Result<Vec<ProgressEvent>> {
        self.query(&ProgressQuery {
            session_key: Some(session_key.to_string()),
            ..Default::default()
        })
    }

    /// Sessions with no terminal event, in first-seen order
    pub fn active_sessions(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_key FROM progress_events
             GROUP BY session_key
             HAVING SUM(event_type IN ('COMPLETED', 'FAILED')) = 0
             ORDER BY MIN(seq)",
        )?;
        let sessions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Aggregate one session's log
    pub fn aggregate(&self, session_key: &str) -> Result<ProgressAggregate> {
        let events = self.events_for_session(session_key)?;
        if events.is_empty() {
            return Ok(ProgressAggregate::default());
        }

        let mut counts_by_type = BTreeMap::new();
        let mut unique_tools = Vec::new();
        for event in &events {
            *counts_by_type
                .entry(event.event_type.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(tool) = &event.metadata.tool_name {
                if !unique_tools.contains(tool) {
                    unique_tools.push(tool.clone());
                }
            }
        }

        let first = events.first().map(|e| e.timestamp);
        let last = events.last().map(|e| e.timestamp);
        let elapsed_ms = match (first, last) {
            (Some(a), Some(b)) => Some((b - a).num_milliseconds()),
            _ => None,
        };

        let terminal = events.iter().any(|e| e.event_type.is_terminal());
        let completion_percentage = if terminal {
            100.0
        } else {
            let latest = events.last().expect("non-empty");
            match latest.metrics.estimated_remaining {
                Some(remaining) if latest.metrics.steps_completed + remaining > 0 => {
                    100.0 * latest.metrics.steps_completed as f64
                        / (latest.metrics.steps_completed + remaining) as f64
                }
                _ => 0.0,
            }
        };

        Ok(ProgressAggregate {
            counts_by_type,
            unique_tools,
            elapsed_ms,
            completion_percentage,
        })
    }

    /// Remove every event of one session; returns the count removed
    pub fn delete_session(&self, session_key: &str) -> Result<i64> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM progress_events WHERE session_key = ?1",
            params![session_key],
        )?;
        Ok(removed as i64)
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<ProgressEvent> {
        let type_raw: String = row.get("event_type")?;
        let event_type = ProgressEventType::parse_name(&type_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid event_type: {}", type_raw),
                )),
            )
        })?;

        let timestamp_ms: i64 = row.get("timestamp")?;
        let metrics_json: String = row.get("metrics")?;
        let metadata_json: String = row.get("metadata")?;

        Ok(ProgressEvent {
            event_id: row.get("event_id")?,
            timestamp: DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_default(),
            session_key: row.get("session_key")?,
            agent_label: row.get("agent_label")?,
            event_type,
            message: row.get("message")?,
            metrics: serde_json::from_str::<ProgressMetrics>(&metrics_json).unwrap_or_default(),
            metadata: serde_json::from_str::<ProgressMetadata>(&metadata_json)
                .unwrap_or_default(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
