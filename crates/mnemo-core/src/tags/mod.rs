//! Tag System
//!
//! Multi-dimensional extraction from text, embedding-based similar-tag
//! lookup, and hybrid exact+semantic tag matching. The tag record itself
//! ([`crate::memory::StructuredTags`]) lives with the chunk model.

mod extract;
mod similarity;

pub use extract::TagExtractor;
pub use similarity::{
    find_similar_tags, hybrid_tag_search, TagMatch, TagMatchType, DEFAULT_TAG_LIMIT,
    EXACT_MATCH_SCORE, MIN_TAG_SIMILARITY,
};
