//! Tag Similarity Search
//!
//! Semantic lookup over the tag-embedding table plus the hybrid
//! (exact + semantic) tag matcher. The tag vocabulary is bounded, so a
//! linear scan with exact cosine similarity is the whole algorithm - no
//! approximate index needed.

use serde::{Deserialize, Serialize};

use crate::embeddings::cosine_similarity;
use crate::memory::TagDimension;
use crate::storage::{ChunkStore, Result};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default minimum cosine similarity for semantic tag matches
pub const MIN_TAG_SIMILARITY: f32 = 0.7;

/// Default result cap for tag lookups
pub const DEFAULT_TAG_LIMIT: usize = 10;

/// Score assigned to exact tag matches; always outranks semantic scores,
/// which are cosine similarities in [-1, 1]
pub const EXACT_MATCH_SCORE: f32 = 2.0;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// How a tag was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagMatchType {
    /// Case-insensitive equality with the query
    Exact,
    /// Embedding similarity above the threshold
    Semantic,
}

/// A matched tag value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMatch {
    /// The tag value
    pub value: String,
    /// Which dimension it lives in
    pub dimension: TagDimension,
    /// 2.0 for exact, cosine similarity for semantic
    pub score: f32,
    /// Match kind
    pub match_type: TagMatchType,
}

// ============================================================================
// SEMANTIC LOOKUP
// ============================================================================

/// Find stored tags similar to a query vector
///
/// Linear scan over every stored tag embedding (optionally one dimension),
/// filtered by `min_similarity`, sorted descending, capped at `limit`.
/// Stored vectors are unit-length by the store's invariant, so raw cosine
/// similarity needs no re-normalization.
pub fn find_similar_tags(
    store: &ChunkStore,
    query: &[f32],
    dimension: Option<TagDimension>,
    min_similarity: f32,
    limit: usize,
) -> Result<Vec<TagMatch>> {
    let mut matches: Vec<TagMatch> = store
        .all_tag_embeddings(dimension)?
        .into_iter()
        .filter_map(|(value, dimension, vector)| {
            let score = cosine_similarity(query, &vector);
            (score >= min_similarity).then_some(TagMatch {
                value,
                dimension,
                score,
                match_type: TagMatchType::Semantic,
            })
        })
        .collect();

    sort_matches(&mut matches);
    matches.truncate(limit);
    Ok(matches)
}

// ============================================================================
// HYBRID LOOKUP
// ============================================================================

/// Exact and semantic tag matches, merged
///
/// Exact matches (case-insensitive equality with the trimmed query) score
/// 2.0; semantic matches score their cosine similarity. A value matched
/// both ways keeps the exact entry.
pub fn hybrid_tag_search(
    store: &ChunkStore,
    query: &str,
    query_embedding: Option<&[f32]>,
    dimension: Option<TagDimension>,
    limit: usize,
) -> Result<Vec<TagMatch>> {
    let needle = query.trim().to_lowercase();

    let mut matches: Vec<TagMatch> = Vec::new();
    if !needle.is_empty() {
        for (value, dimension, _) in store.all_tag_embeddings(dimension)? {
            if value.to_lowercase() == needle {
                matches.push(TagMatch {
                    value,
                    dimension,
                    score: EXACT_MATCH_SCORE,
                    match_type: TagMatchType::Exact,
                });
            }
        }
    }

    if let Some(vector) = query_embedding {
        let semantic =
            find_similar_tags(store, vector, dimension, MIN_TAG_SIMILARITY, limit)?;
        for candidate in semantic {
            let already_exact = matches
                .iter()
                .any(|m| m.value == candidate.value && m.dimension == candidate.dimension);
            if !already_exact {
                matches.push(candidate);
            }
        }
    }

    sort_matches(&mut matches);
    matches.truncate(limit);
    Ok(matches)
}

/// Descending score, then dimension, then value - fully deterministic
fn sort_matches(matches: &mut [TagMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.dimension.as_str().cmp(b.dimension.as_str()))
            .then_with(|| a.value.cmp(&b.value))
    });
}

// ============================================================================
// TESTS
// ============================================================================
