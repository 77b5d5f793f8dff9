//! Vector Search Index
//!
//! HNSW (Hierarchical Navigable Small World) index over USearch, keyed by
//! chunk id through a string ↔ u64 mapping. The index is an in-memory
//! mirror of the `chunk_embeddings` table and is rebuilt from it when the
//! store opens; the table is the durable truth.
//!
//! Search returns raw cosine distances; callers map distance `d` to a
//! similarity score via `1 / (1 + d)`.

use std::collections::HashMap;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::embeddings::EMBEDDING_DIMENSIONS;

// ============================================================================
// CONSTANTS
// ============================================================================

/// HNSW connectivity parameter (higher = better recall, more memory)
pub const DEFAULT_CONNECTIVITY: usize = 16;

/// HNSW expansion factor for index building
pub const DEFAULT_EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search
pub const DEFAULT_EXPANSION_SEARCH: usize = 64;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Vector index error
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorIndexError {
    /// Failed to create the index
    #[error("Index creation failed: {0}")]
    Creation(String),
    /// Failed to add a vector
    #[error("Failed to add vector: {0}")]
    Add(String),
    /// Failed to search
    #[error("Search failed: {0}")]
    Search(String),
    /// Dimension mismatch
    #[error("Invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the vector index
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Number of dimensions
    pub dimensions: usize,
    /// HNSW connectivity parameter
    pub connectivity: usize,
    /// Expansion factor for adding vectors
    pub expansion_add: usize,
    /// Expansion factor for searching
    pub expansion_search: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone)]
pub struct VectorIndexStats {
    /// Total number of vectors
    pub total_vectors: usize,
    /// Vector dimensions
    pub dimensions: usize,
    /// Estimated memory usage in bytes
    pub memory_bytes: usize,
}

// ============================================================================
// VECTOR INDEX
// ============================================================================

/// HNSW vector index keyed by chunk id
pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: u64,
}

impl VectorIndex {
    /// Create a new index with default configuration
    pub fn new() -> Result<Self, VectorIndexError> {
        Self::with_config(VectorIndexConfig::default())
    }

    /// Create a new index with custom configuration
    pub fn with_config(config: VectorIndexConfig) -> Result<Self, VectorIndexError> {
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index =
            Index::new(&options).map_err(|e| VectorIndexError::Creation(e.to_string()))?;

        Ok(Self {
            index,
            config,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: 0,
        })
    }

    /// Number of vectors in the index
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// True when the index holds no vectors
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured dimensions
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn reserve(&self, capacity: usize) -> Result<(), VectorIndexError> {
        self.index
            .reserve(capacity)
            .map_err(|e| VectorIndexError::Creation(format!("Failed to reserve capacity: {}", e)))
    }

    /// Add or replace a vector under a chunk id
    pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.config.dimensions {
            return Err(VectorIndexError::InvalidDimensions {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }

        if let Some(&existing_id) = self.key_to_id.get(key) {
            self.index
                .remove(existing_id)
                .map_err(|e| VectorIndexError::Add(e.to_string()))?;
            self.reserve(self.index.size() + 1)?;
            self.index
                .add(existing_id, vector)
                .map_err(|e| VectorIndexError::Add(e.to_string()))?;
            return Ok(());
        }

        // usearch requires reserved capacity before add
        let capacity = self.index.capacity();
        if self.index.size() >= capacity {
            self.reserve(std::cmp::max(capacity * 2, 16))?;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.index
            .add(id, vector)
            .map_err(|e| VectorIndexError::Add(e.to_string()))?;

        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());

        Ok(())
    }

    /// Remove a vector by chunk id; false when absent
    pub fn remove(&mut self, key: &str) -> Result<bool, VectorIndexError> {
        if let Some(id) = self.key_to_id.remove(key) {
            self.id_to_key.remove(&id);
            self.index
                .remove(id)
                .map_err(|e| VectorIndexError::Add(e.to_string()))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// True when the chunk id is indexed
    pub fn contains(&self, key: &str) -> bool {
        self.key_to_id.contains_key(key)
    }

    /// k-nearest-neighbor search returning (chunk id, raw cosine distance)
    /// in ascending distance order
    pub fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(String, f32)>, VectorIndexError> {
        if query.len() != self.config.dimensions {
            return Err(VectorIndexError::InvalidDimensions {
                expected: self.config.dimensions,
                got: query.len(),
            });
        }

        if self.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let results = self
            .index
            .search(query, limit)
            .map_err(|e| VectorIndexError::Search(e.to_string()))?;

        let mut out = Vec::with_capacity(results.keys.len());
        for (key, distance) in results.keys.iter().zip(results.distances.iter()) {
            if let Some(chunk_id) = self.id_to_key.get(key) {
                out.push((chunk_id.clone(), *distance));
            }
        }

        Ok(out)
    }

    /// Index statistics
    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.config.dimensions,
            memory_bytes: self.index.serialized_length(),
        }
    }
}

/// Map a raw cosine distance to a similarity score in (0, 1]
#[inline]
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

// ============================================================================
// TESTS
// ============================================================================
