//! Search Module
//!
//! Retrieval primitives shared by the store and the context injector:
//! - FTS5 query construction and BM25 score mapping
//! - Hybrid merge, deterministic ordering, and tag-boost re-ranking
//! - HNSW vector index (behind the `vector-search` feature)

mod hybrid;
mod text;

#[cfg(feature = "vector-search")]
mod vector;

pub use hybrid::{
    apply_tag_boost, matches_boost, merge_candidates, sort_results, ComponentScores,
    HybridConfig, DEFAULT_OVERFETCH, DEFAULT_TAG_BOOST, DEFAULT_TEXT_WEIGHT,
    DEFAULT_VECTOR_WEIGHT,
};

pub use text::{build_fts_query, rank_to_score, tokenize};

#[cfg(feature = "vector-search")]
pub use vector::{
    distance_to_score, VectorIndex, VectorIndexConfig, VectorIndexError, VectorIndexStats,
    DEFAULT_CONNECTIVITY,
};
