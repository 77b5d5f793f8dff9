//! Ingest Hooks
//!
//! Stateless pattern-driven fact extraction from message sequences, plus
//! the session-end and compaction hooks that route extracted facts into
//! the memory facade with the right tier and attributes.
//!
//! Extraction is deliberately dumb: fixed case-insensitive trigger
//! patterns, a bounded snippet after each match, a confidence formula,
//! and case-insensitive dedup. What to remember beyond these triggers is
//! someone else's policy.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::engine::{Memory, RememberOptions};
use crate::memory::Tier;
use crate::storage::Result;
use crate::tags::TagExtractor;

// ============================================================================
// TYPES
// ============================================================================

/// One conversational message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Speaker role (`user`, `assistant`, `system`)
    pub role: String,
    /// Raw message text
    pub content: String,
    /// When the message was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Construct a message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: None,
        }
    }
}

/// A candidate fact extracted from a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFact {
    /// The snippet following the trigger
    pub content: String,
    /// Category implied by the trigger (`fact`, `decision`, ...)
    pub category: String,
    /// `0.5 + boost + (important ? 0.2 : 0)`, clamped to 1.0
    pub confidence: f64,
    /// Whether the trigger marks the fact as important
    pub important: bool,
}

// ============================================================================
// TRIGGER PATTERNS
// ============================================================================

/// Snippet cap after a trigger match
const SNIPPET_MAX_CHARS: usize = 200;

/// Extractions at or below this length are rejected
const MIN_FACT_CHARS: usize = 10;

struct Trigger {
    pattern: Regex,
    category: &'static str,
    boost: f64,
    important: bool,
}

fn trigger(pattern: &str, category: &'static str, boost: f64, important: bool) -> Trigger {
    Trigger {
        pattern: RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("static trigger pattern"),
        category,
        boost,
        important,
    }
}

static TRIGGERS: LazyLock<Vec<Trigger>> = LazyLock::new(|| {
    vec![
        // Explicit-memory triggers; the three strongest forms mark importance
        trigger(r"remember\s+(that|this|:)", "fact", 0.3, true),
        trigger(r"don'?t\s+forget", "fact", 0.3, true),
        trigger(r"important:", "fact", 0.3, true),
        trigger(r"keep\s+in\s+mind", "fact", 0.2, false),
        trigger(r"note:", "fact", 0.2, false),
        // Decisions
        trigger(r"\b(we|i)\s+decided\s+(to|that)\b", "decision", 0.2, false),
        trigger(r"let'?s\s+go\s+with", "decision", 0.15, false),
        trigger(r"\bthe\s+plan\s+is\b", "decision", 0.15, false),
        // Preferences
        trigger(r"\b(i|we)\s+prefer\b", "preference", 0.15, false),
        trigger(
            r"\b(i|we)\s+(always|never)\s+(use|want|like)\b",
            "preference",
            0.15,
            false,
        ),
        // Lessons
        trigger(r"\b(i|we)\s+learned\s+(that|:)", "lesson", 0.15, false),
        trigger(r"lesson:", "lesson", 0.15, false),
        trigger(r"never\s+again", "lesson", 0.15, false),
        // Person attributes
        trigger(
            r"\b(his|her|their)\s+(name|email|phone|role|title)\s+is\b",
            "person",
            0.15,
            false,
        ),
        trigger(
            r"\b(he|she|they)\s+(works?|lives?|is)\s+(at|in|a)\b",
            "person",
            0.15,
            false,
        ),
        // Events
        trigger(r"\b(today|yesterday|tomorrow)\s+(we|i)\b", "event", 0.15, false),
        trigger(
            r"(just|recently)\s+(set\s+up|configured|deployed|fixed|broke|updated)",
            "event",
            0.15,
            false,
        ),
    ]
});

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract candidate facts from a message sequence
///
/// System messages are skipped. For each trigger match the text after the
/// match is consumed up to the first period, first newline, or 200
/// characters, whichever comes first; snippets of 10 characters or fewer
/// are rejected. Duplicate snippets (case-insensitive, trimmed) dedupe.
pub fn extract_facts(messages: &[Message]) -> Vec<ExtractedFact> {
    let mut facts: Vec<ExtractedFact> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for message in messages {
        if message.role.eq_ignore_ascii_case("system") {
            continue;
        }

        for trigger in TRIGGERS.iter() {
            let Some(found) = trigger.pattern.find(&message.content) else {
                continue;
            };

            let snippet = consume_snippet(&message.content[found.end()..]);
            if snippet.chars().count() <= MIN_FACT_CHARS {
                continue;
            }

            if !seen.insert(snippet.to_lowercase()) {
                continue;
            }

            let confidence = (0.5
                + trigger.boost
                + if trigger.important { 0.2 } else { 0.0 })
            .min(1.0);

            facts.push(ExtractedFact {
                content: snippet,
                category: trigger.category.to_string(),
                confidence,
                important: trigger.important,
            });
        }
    }

    facts
}

/// Text after a match up to the first period, first newline, or the
/// character cap - whichever comes first - trimmed
fn consume_snippet(rest: &str) -> String {
    let mut end = rest.len();
    if let Some(i) = rest.find('.') {
        end = end.min(i);
    }
    if let Some(i) = rest.find('\n') {
        end = end.min(i);
    }
    if let Some(i) = rest.char_indices().nth(SNIPPET_MAX_CHARS).map(|(i, _)| i) {
        end = end.min(i);
    }
    rest[..end].trim().to_string()
}

// ============================================================================
// HOOKS
// ============================================================================

/// Session ingest hooks
#[derive(Debug, Default)]
pub struct SessionHooks {
    extractor: TagExtractor,
}

impl SessionHooks {
    /// Create the hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Session-end hook: extract facts and route them into the facade
    ///
    /// Important facts land in long-term memory; the rest go to
    /// short-term with the default retention. Returns the new chunk ids.
    pub fn on_session_end(
        &self,
        memory: &Memory,
        session_id: &str,
        messages: &[Message],
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();

        for fact in extract_facts(messages) {
            let tier = if fact.important {
                Tier::LongTerm
            } else {
                Tier::ShortTerm
            };

            let id = memory.remember(
                &fact.content,
                RememberOptions {
                    tier: Some(tier),
                    confidence: Some(fact.confidence),
                    category: Some(fact.category.clone()),
                    source: Some(session_id.to_string()),
                    tags: Some(self.extractor.extract(&fact.content)),
                    important: fact.important,
                    ..Default::default()
                },
            )?;
            ids.push(id);
        }

        Ok(ids)
    }

    /// Compaction hook: session-end routing plus a topics summary chunk
    /// built from the first-line prefixes of the last five user messages
    pub fn on_compaction(
        &self,
        memory: &Memory,
        session_id: &str,
        messages: &[Message],
    ) -> Result<Vec<String>> {
        let mut ids = self.on_session_end(memory, session_id, messages)?;

        let topics: Vec<String> = messages
            .iter()
            .rev()
            .filter(|m| m.role.eq_ignore_ascii_case("user"))
            .take(5)
            .map(|m| first_line_prefix(&m.content))
            .filter(|line| !line.is_empty())
            .collect();

        if !topics.is_empty() {
            // Restore chronological order after the reverse scan
            let ordered: Vec<String> = topics.into_iter().rev().collect();
            let content = format!("Topics discussed: {}", ordered.join("; "));

            let id = memory.remember(
                &content,
                RememberOptions {
                    tier: Some(Tier::ShortTerm),
                    category: Some("event".to_string()),
                    source: Some(session_id.to_string()),
                    ..Default::default()
                },
            )?;
            ids.push(id);
        }

        Ok(ids)
    }
}

/// First line of a message, capped at 80 characters
fn first_line_prefix(content: &str) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    line.chars().take(80).collect()
}

// ============================================================================
// TESTS
// ============================================================================
