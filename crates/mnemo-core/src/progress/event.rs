//! Progress Event Model
//!
//! Events form a monotonically-growing log of sub-agent execution
//! progress, keyed by session. Two event types are terminal; once a
//! session sees one, the tracker refuses further emission for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// EVENT TYPE
// ============================================================================

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEventType {
    /// Sub-agent was created
    Spawned,
    /// Sub-agent began executing
    Started,
    /// Incremental progress report
    Progress,
    /// A tool invocation
    ToolCall,
    /// A thinking block
    Thinking,
    /// Terminal: finished successfully
    Completed,
    /// Terminal: finished with an error
    Failed,
}

impl ProgressEventType {
    /// All event types
    pub const ALL: [ProgressEventType; 7] = [
        ProgressEventType::Spawned,
        ProgressEventType::Started,
        ProgressEventType::Progress,
        ProgressEventType::ToolCall,
        ProgressEventType::Thinking,
        ProgressEventType::Completed,
        ProgressEventType::Failed,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressEventType::Spawned => "SPAWNED",
            ProgressEventType::Started => "STARTED",
            ProgressEventType::Progress => "PROGRESS",
            ProgressEventType::ToolCall => "TOOL_CALL",
            ProgressEventType::Thinking => "THINKING",
            ProgressEventType::Completed => "COMPLETED",
            ProgressEventType::Failed => "FAILED",
        }
    }

    /// Parse from the wire representation
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "SPAWNED" => Some(ProgressEventType::Spawned),
            "STARTED" => Some(ProgressEventType::Started),
            "PROGRESS" => Some(ProgressEventType::Progress),
            "TOOL_CALL" => Some(ProgressEventType::ToolCall),
            "THINKING" => Some(ProgressEventType::Thinking),
            "COMPLETED" => Some(ProgressEventType::Completed),
            "FAILED" => Some(ProgressEventType::Failed),
            _ => None,
        }
    }

    /// Whether this event ends its session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEventType::Completed | ProgressEventType::Failed)
    }
}

impl std::fmt::Display for ProgressEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// METRICS & METADATA
// ============================================================================

/// Per-event metric counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressMetrics {
    /// Steps completed so far
    pub steps_completed: i64,
    /// Estimated steps remaining, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<i64>,
    /// Confidence in the estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Tool calls so far
    pub tool_call_count: i64,
    /// Thinking blocks so far
    pub thinking_block_count: i64,
}

/// Per-event metadata bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressMetadata {
    /// Parent session, for nested sub-agents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_key: Option<String>,
    /// Tool name, for TOOL_CALL events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Run duration, for terminal events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Error text, for FAILED events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// ============================================================================
// EVENT
// ============================================================================

/// One progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Unique event id (UUID v4)
    pub event_id: String,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Session this event belongs to
    pub session_key: String,
    /// Human-readable agent label
    pub agent_label: String,
    /// Event kind
    pub event_type: ProgressEventType,
    /// Free-text message
    pub message: String,
    /// Metric counters at emission time
    pub metrics: ProgressMetrics,
    /// Metadata bag
    pub metadata: ProgressMetadata,
}

impl ProgressEvent {
    /// Build an event with a fresh id and the current time
    pub fn new(
        session_key: impl Into<String>,
        agent_label: impl Into<String>,
        event_type: ProgressEventType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_key: session_key.into(),
            agent_label: agent_label.into(),
            event_type,
            message: message.into(),
            metrics: ProgressMetrics::default(),
            metadata: ProgressMetadata::default(),
        }
    }

    /// Replace the metrics
    pub fn with_metrics(mut self, metrics: ProgressMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the metadata
    pub fn with_metadata(mut self, metadata: ProgressMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
