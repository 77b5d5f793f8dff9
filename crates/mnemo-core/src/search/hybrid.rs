//! Hybrid Search (Inverted Index + Vector)
//!
//! Merges the two ranked candidate lists by chunk id, computes a weighted
//! linear combination of the component scores (a missing component scores
//! zero), and sorts with a deterministic tie-break so identical searches
//! over the same store return identical `(id, score)` sequences.

use std::collections::HashMap;

use crate::memory::{MatchType, SearchResult, StructuredTags, TagDimension};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Default weight for the vector similarity component
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;

/// Default weight for the inverted-index similarity component
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.3;

/// Over-fetch multiplier applied to both sources before merging
pub const DEFAULT_OVERFETCH: i64 = 3;

/// Default multiplicative boost for structured-tag matches
pub const DEFAULT_TAG_BOOST: f32 = 1.3;

/// Configuration for hybrid search
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Weight for vector similarity
    pub vector_weight: f32,
    /// Weight for inverted-index similarity
    pub text_weight: f32,
    /// Candidate over-fetch multiplier
    pub overfetch: i64,
    /// Multiplicative boost applied by tag-boosted search
    pub tag_boost: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            text_weight: DEFAULT_TEXT_WEIGHT,
            overfetch: DEFAULT_OVERFETCH,
            tag_boost: DEFAULT_TAG_BOOST,
        }
    }
}

// ============================================================================
// MERGING
// ============================================================================

/// Component scores for one candidate chunk
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentScores {
    /// Inverted-index similarity, if the chunk matched there
    pub text: Option<f32>,
    /// Vector similarity, if the chunk matched there
    pub vector: Option<f32>,
}

impl ComponentScores {
    /// Weighted linear combination; a missing component contributes zero
    pub fn combined(&self, config: &HybridConfig) -> f32 {
        config.vector_weight * self.vector.unwrap_or(0.0)
            + config.text_weight * self.text.unwrap_or(0.0)
    }

    /// Which modality produced the match
    pub fn match_type(&self) -> MatchType {
        match (self.text.is_some(), self.vector.is_some()) {
            (true, true) => MatchType::Both,
            (false, true) => MatchType::Vector,
            _ => MatchType::Text,
        }
    }
}

/// Merge the two ranked lists into per-id component scores
pub fn merge_candidates(
    text_results: &[(String, f32)],
    vector_results: &[(String, f32)],
) -> HashMap<String, ComponentScores> {
    let mut merged: HashMap<String, ComponentScores> = HashMap::new();

    for (id, score) in text_results {
        merged.entry(id.clone()).or_default().text = Some(*score);
    }
    for (id, score) in vector_results {
        merged.entry(id.clone()).or_default().vector = Some(*score);
    }

    merged
}

/// Deterministic result ordering: combined score descending, then newer
/// `updated_at`, then lexicographic id
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.chunk.updated_at.cmp(&a.chunk.updated_at))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}

// ============================================================================
// TAG BOOST
// ============================================================================

/// True when the chunk's tags contain any value in any specified boost
/// dimension
pub fn matches_boost(tags: &StructuredTags, boost: &StructuredTags) -> bool {
    TagDimension::ALL.iter().any(|d| {
        boost
            .dimension(*d)
            .iter()
            .any(|value| tags.contains(*d, value))
    })
}

/// Apply the multiplicative tag boost and re-sort
pub fn apply_tag_boost(results: &mut [SearchResult], boost: &StructuredTags, factor: f32) {
    for result in results.iter_mut() {
        if matches_boost(&result.chunk.tags, boost) {
            result.combined_score *= factor;
        }
    }
    sort_results(results);
}

// ============================================================================
// TESTS
// ============================================================================
