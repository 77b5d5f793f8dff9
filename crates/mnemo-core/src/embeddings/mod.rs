//! Semantic Embeddings Module
//!
//! The engine consumes embeddings through the [`EmbeddingProvider`] trait;
//! it never generates them itself. The optional `embeddings` feature ships
//! a local fastembed-backed implementation (all-MiniLM-L6-v2, 384
//! dimensions, ONNX inference, no network calls at query time).

#[cfg(feature = "embeddings")]
mod local;

#[cfg(feature = "embeddings")]
pub use local::LocalEmbeddingService;

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default embedding dimensions (all-MiniLM-L6-v2)
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Maximum text length for embedding (longer inputs are truncated)
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size for embedding generation
pub const BATCH_SIZE: usize = 32;

/// Tolerance for the unit-norm invariant on stored vectors
pub const NORM_TOLERANCE: f32 = 1e-3;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedding provider error
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Failed to initialize the model
    #[error("Model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate an embedding
    #[error("Embedding generation failed: {0}")]
    GenerationFailed(String),
    /// Invalid input (empty text, dimension mismatch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// PROVIDER CONTRACT
// ============================================================================

/// Contract for embedding providers (consumed, not owned)
///
/// Implementations must produce unit-length vectors of exactly
/// `dimensions()` floats. `is_available` must be cheap and safe to call
/// repeatedly; the store degrades to text-only retrieval when it reports
/// false.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// Output vector length
    fn dimensions(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed multiple texts; `batch_size` overrides the default batching
    fn embed_batch(
        &self,
        texts: &[&str],
        batch_size: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let _ = batch_size;
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Availability probe
    fn is_available(&self) -> bool;
}

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// A stored embedding vector with its byte codec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// The vector
    pub vector: Vec<f32>,
    /// Vector length
    pub dimensions: usize,
}

impl Embedding {
    /// Create from a vector
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// Whether the L2 norm is within tolerance of 1.0
    pub fn is_normalized(&self) -> bool {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        (norm - 1.0).abs() < NORM_TOLERANCE
    }

    /// Normalize to unit length in place
    pub fn normalize(&mut self) {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }

    /// Encode as little-endian f32 bytes for BLOB storage
    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Decode from little-endian f32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self::new(vector))
    }
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Cosine similarity between two vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 { dot / denominator } else { 0.0 }
}

/// Euclidean distance between two vectors
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Dot product between two vectors
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// TESTS
// ============================================================================
