//! Test Data Factory
//!
//! Deterministic test doubles. The mock embedding provider derives a
//! unit vector from the text's bytes: identical text embeds identically,
//! different text lands elsewhere on the sphere, and nothing touches the
//! network or a model file.

use mnemo_core::{EmbeddingError, EmbeddingProvider, EMBEDDING_DIMENSIONS};

/// Deterministic, dependency-free embedding provider
#[derive(Debug, Default, Clone, Copy)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    /// Create the provider
    pub fn new() -> Self {
        Self
    }

    fn seed(text: &str) -> u64 {
        // FNV-1a over the bytes: stable across runs and platforms
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_id(&self) -> &str {
        "mock-deterministic-embedder"
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let seed = Self::seed(text);
        let raw: Vec<f32> = (0..EMBEDDING_DIMENSIONS)
            .map(|i| {
                let x = seed.wrapping_add(i as u64).wrapping_mul(0x9e3779b97f4a7c15);
                // Map the mixed bits into [-1, 1]
                ((x >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(raw.into_iter().map(|x| x / norm).collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_unit_length() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("same text").unwrap();
        let b = provider.embed("same text").unwrap();
        let c = provider.embed("other text").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
