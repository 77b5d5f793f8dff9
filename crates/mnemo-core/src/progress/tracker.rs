//! Progress Tracker
//!
//! Sits atop the store and the stream: tracks per-session counters,
//! stamps every emitted event with current metrics, persists best-effort
//! (failures are logged, never raised), and publishes to subscribers.
//! A terminal event locks its session against further emission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::event::{ProgressEvent, ProgressEventType, ProgressMetadata, ProgressMetrics};
use super::store::ProgressStore;
use super::stream::ProgressStream;

#[derive(Debug, Default, Clone)]
struct SessionState {
    agent_label: String,
    steps_completed: i64,
    tool_call_count: i64,
    thinking_block_count: i64,
    terminal: bool,
}

/// Per-session progress tracker
pub struct ProgressTracker {
    store: Option<Arc<ProgressStore>>,
    stream: Arc<ProgressStream>,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl ProgressTracker {
    /// Create a tracker; the store is optional (stream-only tracking)
    pub fn new(store: Option<Arc<ProgressStore>>, stream: Arc<ProgressStream>) -> Self {
        Self {
            store,
            stream,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The stream events are published through
    pub fn stream(&self) -> &Arc<ProgressStream> {
        &self.stream
    }

    /// Whether a session has seen its terminal event
    pub fn is_terminal(&self, session_key: &str) -> bool {
        self.sessions
            .lock()
            .map(|sessions| {
                sessions
                    .get(session_key)
                    .is_some_and(|state| state.terminal)
            })
            .unwrap_or(false)
    }

    /// Sub-agent created; registers the session under its label
    pub fn on_spawned(
        &self,
        session_key: &str,
        agent_label: &str,
        message: &str,
        parent_session_key: Option<&str>,
    ) -> Option<ProgressEvent> {
        {
            let mut sessions = self.sessions.lock().ok()?;
            let state = sessions.entry(session_key.to_string()).or_default();
            if state.terminal {
                tracing::warn!("Session {} is terminal, dropping SPAWNED", session_key);
                return None;
            }
            state.agent_label = agent_label.to_string();
        }

        self.emit(
            session_key,
            ProgressEventType::Spawned,
            message,
            ProgressMetadata {
                parent_session_key: parent_session_key.map(str::to_string),
                ..Default::default()
            },
        )
    }

    /// Sub-agent began executing
    pub fn on_started(&self, session_key: &str, message: &str) -> Option<ProgressEvent> {
        self.emit(
            session_key,
            ProgressEventType::Started,
            message,
            ProgressMetadata::default(),
        )
    }

    /// Incremental progress; bumps the step counter
    pub fn on_progress(
        &self,
        session_key: &str,
        message: &str,
        estimated_remaining: Option<i64>,
        confidence: Option<f64>,
    ) -> Option<ProgressEvent> {
        {
            let mut sessions = self.sessions.lock().ok()?;
            let state = sessions.entry(session_key.to_string()).or_default();
            if state.terminal {
                tracing::warn!("Session {} is terminal, dropping PROGRESS", session_key);
                return None;
            }
            state.steps_completed += 1;
        }

        let event = self.build_event(session_key, ProgressEventType::Progress, message)?;
        let mut event = event;
        event.metrics.estimated_remaining = estimated_remaining;
        event.metrics.confidence = confidence;
        self.dispatch(event)
    }

    /// Tool invocation; bumps the tool counter
    pub fn on_tool_call(
        &self,
        session_key: &str,
        tool_name: &str,
        message: &str,
    ) -> Option<ProgressEvent> {
        {
            let mut sessions = self.sessions.lock().ok()?;
            let state = sessions.entry(session_key.to_string()).or_default();
            if state.terminal {
                tracing::warn!("Session {} is terminal, dropping TOOL_CALL", session_key);
                return None;
            }
            state.tool_call_count += 1;
        }

        let event = self.build_event(session_key, ProgressEventType::ToolCall, message)?;
        let mut event = event;
        event.metadata.tool_name = Some(tool_name.to_string());
        self.dispatch(event)
    }

    /// Thinking block; bumps the thinking counter
    pub fn on_thinking(&self, session_key: &str, message: &str) -> Option<ProgressEvent> {
        {
            let mut sessions = self.sessions.lock().ok()?;
            let state = sessions.entry(session_key.to_string()).or_default();
            if state.terminal {
                tracing::warn!("Session {} is terminal, dropping THINKING", session_key);
                return None;
            }
            state.thinking_block_count += 1;
        }

        let event = self.build_event(session_key, ProgressEventType::Thinking, message)?;
        self.dispatch(event)
    }

    /// Terminal: success. Locks the session.
    pub fn on_completed(
        &self,
        session_key: &str,
        message: &str,
        duration_ms: Option<i64>,
    ) -> Option<ProgressEvent> {
        let event = self.terminal_event(session_key, ProgressEventType::Completed, message)?;
        let mut event = event;
        event.metadata.duration_ms = duration_ms;
        self.dispatch(event)
    }

    /// Terminal: failure. Locks the session.
    pub fn on_failed(
        &self,
        session_key: &str,
        message: &str,
        error: Option<&str>,
    ) -> Option<ProgressEvent> {
        let event = self.terminal_event(session_key, ProgressEventType::Failed, message)?;
        let mut event = event;
        event.metadata.error = error.map(str::to_string);
        self.dispatch(event)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(
        &self,
        session_key: &str,
        event_type: ProgressEventType,
        message: &str,
        metadata: ProgressMetadata,
    ) -> Option<ProgressEvent> {
        {
            let sessions = self.sessions.lock().ok()?;
            if sessions
                .get(session_key)
                .is_some_and(|state| state.terminal)
            {
                tracing::warn!(
                    "Session {} is terminal, dropping {}",
                    session_key,
                    event_type
                );
                return None;
            }
        }

        let mut event = self.build_event(session_key, event_type, message)?;
        event.metadata = metadata;
        self.dispatch(event)
    }

    fn terminal_event(
        &self,
        session_key: &str,
        event_type: ProgressEventType,
        message: &str,
    ) -> Option<ProgressEvent> {
        {
            let mut sessions = self.sessions.lock().ok()?;
            let state = sessions.entry(session_key.to_string()).or_default();
            if state.terminal {
                tracing::warn!(
                    "Session {} already terminal, dropping {}",
                    session_key,
                    event_type
                );
                return None;
            }
            state.terminal = true;
        }

        self.build_event(session_key, event_type, message)
    }

    /// Stamp an event with the session's current counters
    fn build_event(
        &self,
        session_key: &str,
        event_type: ProgressEventType,
        message: &str,
    ) -> Option<ProgressEvent> {
        let (label, metrics) = {
            let sessions = self.sessions.lock().ok()?;
            let state = sessions.get(session_key).cloned().unwrap_or_default();
            let label = if state.agent_label.is_empty() {
                session_key.to_string()
            } else {
                state.agent_label.clone()
            };
            (
                label,
                ProgressMetrics {
                    steps_completed: state.steps_completed,
                    estimated_remaining: None,
                    confidence: None,
                    tool_call_count: state.tool_call_count,
                    thinking_block_count: state.thinking_block_count,
                },
            )
        };

        Some(
            ProgressEvent::new(session_key, label, event_type, message).with_metrics(metrics),
        )
    }

    /// Persist best-effort, then publish
    fn dispatch(&self, event: ProgressEvent) -> Option<ProgressEvent> {
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&event) {
                tracing::warn!(
                    "Progress event {} not persisted (stream delivery continues): {}",
                    event.event_id,
                    e
                );
            }
        }
        self.stream.publish(&event);
        Some(event)
    }
}

// ============================================================================
// TESTS
// ============================================================================
