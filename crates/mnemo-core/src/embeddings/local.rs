//! Local Embedding Service
//!
//! fastembed-backed provider running all-MiniLM-L6-v2 (384 dimensions)
//! through ONNX. Model weights are fetched once into a platform cache
//! directory; inference is fully local afterwards.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

use super::{
    EmbeddingError, EmbeddingProvider, BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};

/// Model identifier reported by [`LocalEmbeddingService::model_id`]
pub const LOCAL_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// GLOBAL MODEL
// ============================================================================

static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Cache directory for fastembed model files
///
/// Respects MNEMO_EMBED_CACHE, then falls back to the platform cache dir.
fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("MNEMO_EMBED_CACHE") {
        return std::path::PathBuf::from(path);
    }

    if let Some(proj_dirs) = directories::ProjectDirs::from("ai", "mnemo", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/mnemo/fastembed");
    }

    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();

        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("Failed to create cache directory {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
            format!(
                "Failed to initialize all-MiniLM-L6-v2 embedding model: {}. \
                Ensure ONNX runtime is available and model files can be downloaded.",
                e
            )
        })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("Lock poisoned: {}", e))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

/// L2-normalize an output vector so the unit-norm invariant holds on store
fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

fn truncate_input(text: &str) -> &str {
    if text.len() > MAX_TEXT_LENGTH {
        // Cut on a char boundary at or below the cap
        let mut end = MAX_TEXT_LENGTH;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    } else {
        text
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Local fastembed-backed embedding provider
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEmbeddingService;

impl LocalEmbeddingService {
    /// Create a new service handle (the model itself is process-global)
    pub fn new() -> Self {
        Self
    }

    /// Initialize the model eagerly (downloads on first use)
    pub fn init(&self) -> Result<(), EmbeddingError> {
        get_model().map(|_| ())
    }
}

impl EmbeddingProvider for LocalEmbeddingService {
    fn model_id(&self) -> &str {
        LOCAL_MODEL_ID
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

        let mut model = get_model()?;
        let text = truncate_input(text);

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationFailed("No embedding generated".to_string()))?;

        Ok(normalize(vector))
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        batch_size: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch = batch_size.unwrap_or(BATCH_SIZE).max(1);
        let mut model = get_model()?;
        let mut all = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch) {
            let truncated: Vec<&str> = chunk.iter().map(|t| truncate_input(t)).collect();

            let embeddings = model
                .embed(truncated, None)
                .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

            for emb in embeddings {
                all.push(normalize(emb));
            }
        }

        Ok(all)
    }

    fn is_available(&self) -> bool {
        match get_model() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Embedding model not ready: {}", e);
                false
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
