//! Full-Text Search Primitives
//!
//! Query construction and score mapping for the FTS5 inverted index.
//!
//! Raw query strings are tokenized to alphanumeric-plus-underscore runs,
//! each token quoted, and the tokens OR-ed together. OR is chosen for
//! recall; the BM25 ranker sorts for precision.

/// Build an FTS5 MATCH expression from a raw query string
///
/// Returns `None` when the input yields no tokens (an empty token set must
/// produce the empty result list, not an FTS error).
pub fn build_fts_query(raw: &str) -> Option<String> {
    let tokens: Vec<String> = tokenize(raw)
        .into_iter()
        .map(|t| format!("\"{}\"", t))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Split a string into alphanumeric-plus-underscore runs
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in raw.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Map a BM25 rank to a similarity score
///
/// FTS5 rank is negative-valued (more negative = more relevant); the
/// mapping `|r| / (1 + |r|)` lands in [0, 1) and preserves order.
pub fn rank_to_score(rank: f64) -> f32 {
    let magnitude = rank.abs();
    (magnitude / (1.0 + magnitude)) as f32
}

// ============================================================================
// TESTS
// ============================================================================
