//! Memory module - Core types and data structures
//!
//! Defines the chunk model, tiers, structured tags, filters, and the
//! result types shared by the search and context layers.

mod chunk;
mod tags;

pub use chunk::{
    Chunk, ChunkFilter, ChunkInput, ChunkPatch, HorizonCategory, ListOptions, OrderBy, SortOrder,
    Tier,
};
pub use tags::{StructuredTags, TagDimension};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// STORE STATISTICS
// ============================================================================

/// Statistics about the chunk store
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Total number of chunks
    pub total_chunks: i64,
    /// Chunk counts per tier
    pub by_tier: BTreeMap<String, i64>,
    /// Chunk counts per category (uncategorized chunks are omitted)
    pub by_category: BTreeMap<String, i64>,
    /// Chunk counts per compartmentalization subject
    pub by_person: BTreeMap<String, i64>,
    /// Timestamp of the oldest chunk
    pub oldest_chunk: Option<DateTime<Utc>>,
    /// Timestamp of the newest chunk
    pub newest_chunk: Option<DateTime<Utc>>,
    /// Number of chunks with a vector-index row
    pub chunks_with_embeddings: i64,
    /// On-disk size (page count × page size)
    pub disk_bytes: i64,
}

// ============================================================================
// SEARCH RESULTS
// ============================================================================

/// How a hybrid result was matched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    /// Matched via the inverted index only
    Text,
    /// Matched via the vector index only
    Vector,
    /// Matched via both
    Both,
}

/// A search result carrying its component and combined scores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Inverted-index similarity, if matched there
    pub text_score: Option<f32>,
    /// Vector similarity, if matched there
    pub vector_score: Option<f32>,
    /// Weighted combination (after any tag boost)
    pub combined_score: f32,
    /// Which modality produced the match
    pub match_type: MatchType,
}

/// A chunk with a single relevance score (vector search, injector ranking)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

// ============================================================================
// RECALL INPUT
// ============================================================================

/// Search modality for `recall`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    /// Inverted-index search only
    Text,
    /// Vector search only
    Semantic,
    /// Weighted fusion of both (default)
    #[default]
    Hybrid,
}

/// Options for the facade's `recall`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecallOptions {
    /// Maximum results to return
    pub limit: i64,
    /// Search modality; degrades to text when vector capability is absent
    pub mode: SearchMode,
    /// Shared filter predicate (tier, person, category, tags)
    pub filter: ChunkFilter,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            mode: SearchMode::Hybrid,
            filter: ChunkFilter::default(),
        }
    }
}

impl RecallOptions {
    /// Recall scoped to a compartmentalization subject
    pub fn for_person(person: impl Into<String>) -> Self {
        Self {
            filter: ChunkFilter::for_person(person),
            ..Default::default()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
