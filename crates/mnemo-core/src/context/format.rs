//! Context Formatting
//!
//! Token estimation, relative-time bucketing, section headers, and the
//! bullet-line chunk formatter shared by every context consumer. The
//! token heuristic is fixed (`ceil(bytes / 4)`) so all layers agree on
//! what fits in a budget.

use chrono::{DateTime, Utc};

use crate::memory::{Chunk, Tier};

/// Estimate the token count of a text: `ceil(bytes / 4)`
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Section header for a tier
pub fn tier_header(tier: Tier) -> &'static str {
    match tier {
        Tier::Working => "## Working Memory",
        Tier::ShortTerm => "## Recent Context (Short-Term Memory)",
        Tier::LongTerm => "## Known Facts (Long-Term Memory)",
        Tier::Episodic => "## Past Events (Episodic Memory)",
    }
}

/// Human-friendly relative time bucketing
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", hours)
        }
    } else if days < 2 {
        "yesterday".to_string()
    } else if days < 7 {
        format!("{} days ago", days)
    } else if days < 30 {
        let weeks = days / 7;
        if weeks == 1 {
            "1 week ago".to_string()
        } else {
            format!("{} weeks ago", weeks)
        }
    } else {
        let months = days / 30;
        if months == 1 {
            "1 month ago".to_string()
        } else {
            format!("{} months ago", months)
        }
    }
}

/// Format one chunk as a bullet line for its tier's section
///
/// Short-term and episodic lines carry a relative timestamp; long-term and
/// working lines are bare. The summary stands in for the content when
/// present.
pub fn format_chunk_line(chunk: &Chunk, now: DateTime<Utc>) -> String {
    let text = chunk.summary.as_deref().unwrap_or(&chunk.content);
    match chunk.tier {
        Tier::ShortTerm | Tier::Episodic => {
            format!("- [{}] {}", relative_time(chunk.updated_at, now), text)
        }
        Tier::LongTerm | Tier::Working => format!("- {}", text),
    }
}

// ============================================================================
// TESTS
// ============================================================================
