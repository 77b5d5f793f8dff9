//! Memory Facade
//!
//! Thin orchestration layer over the chunk store, an optional embedding
//! provider, the context injector, and the maintenance runner. Owns the
//! lifecycle: `open` once, `close` once, everything in between delegates
//! down with the right defaults applied.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::{AssembledContext, ContextInjector, InjectorConfig, QuerySignals};
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::export::{export_to_path, restore_from_path, RestoreReport};
use crate::horizon::{apply_prediction, HorizonEstimator};
use crate::maintenance::{Maintenance, MaintenanceConfig, MaintenanceSummary};
use crate::memory::{
    Chunk, ChunkInput, ChunkPatch, ListOptions, MemoryStats, RecallOptions, SearchMode,
    StructuredTags, TagDimension, Tier,
};
use crate::storage::{ChunkStore, Result, StoreError};
use crate::tags::{find_similar_tags, hybrid_tag_search, TagMatch, MIN_TAG_SIMILARITY};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default confidence assigned by `remember`
pub const DEFAULT_REMEMBER_CONFIDENCE: f64 = 0.7;

/// Summary generation cap (characters)
pub const SUMMARY_MAX_CHARS: usize = 150;

/// Query-embedding LRU capacity
const QUERY_CACHE_CAPACITY: usize = 100;

// ============================================================================
// OPTIONS
// ============================================================================

/// Construction options for the facade
#[derive(Default)]
pub struct MemoryOptions {
    /// Embedding provider; absent = text-only retrieval
    pub provider: Option<Arc<dyn EmbeddingProvider>>,
    /// Injector tuning
    pub injector: InjectorConfig,
    /// Maintenance tuning (also supplies the retention window)
    pub maintenance: MaintenanceConfig,
}

/// Options for `remember`
#[derive(Debug, Clone, Default)]
pub struct RememberOptions {
    /// Lifecycle tier; defaults to short-term
    pub tier: Option<Tier>,
    /// Confidence; defaults to 0.7
    pub confidence: Option<f64>,
    /// Explicit summary; generated from the content when absent
    pub summary: Option<String>,
    /// Origin hint
    pub source: Option<String>,
    /// Free-form category
    pub category: Option<String>,
    /// Compartmentalization subject
    pub person: Option<String>,
    /// Structured tags
    pub tags: Option<StructuredTags>,
    /// Explicit expiry; short-term chunks default to now + retention
    pub expires_at: Option<chrono::DateTime<Utc>>,
    /// Attribute bag entries to attach
    pub metadata: Option<Map<String, Value>>,
    /// Shorthand for `metadata.important = true`
    pub important: bool,
    /// Run the horizon estimator and attach its prediction
    pub predict_horizon: bool,
}

/// Snapshot of engine health and capability
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReport {
    /// Crate version
    pub version: String,
    /// Store statistics
    pub stats: MemoryStats,
    /// Whether semantic retrieval is currently possible
    pub semantic_ready: bool,
    /// Whether the vector index is present
    pub vector_index: bool,
    /// Provider model, when one is attached
    pub embedding_model: Option<String>,
    /// Configured vector dimension
    pub dimensions: usize,
    /// Whether the engine has been closed
    pub closed: bool,
}

// ============================================================================
// QUERY-EMBEDDING CACHE
// ============================================================================

/// Caches query embeddings in front of the real provider
///
/// Query text repeats (the same turn drives recall and context assembly;
/// users re-ask); content text does not. Only query paths go through this
/// wrapper.
struct CachedQueryProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedQueryProvider {
    fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        }
    }
}

impl EmbeddingProvider for CachedQueryProvider {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(text) {
                return Ok(hit.clone());
            }
        }

        let vector = self.inner.embed(text)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    fn embed_batch(
        &self,
        texts: &[&str],
        batch_size: Option<usize>,
    ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        self.inner.embed_batch(texts, batch_size)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

// ============================================================================
// FACADE
// ============================================================================

/// The memory engine facade
pub struct Memory {
    store: ChunkStore,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    query_provider: Option<Arc<CachedQueryProvider>>,
    injector: ContextInjector,
    maintenance: Maintenance,
    horizon: HorizonEstimator,
    closed: AtomicBool,
}

impl Memory {
    /// Open a memory engine at `path` (`:memory:` for ephemeral use)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, MemoryOptions::default())
    }

    /// Open with explicit options
    pub fn open_with(path: impl AsRef<Path>, options: MemoryOptions) -> Result<Self> {
        let dimensions = options
            .provider
            .as_ref()
            .map(|p| p.dimensions())
            .unwrap_or(crate::embeddings::EMBEDDING_DIMENSIONS);

        let store = ChunkStore::open_with_dimensions(path, dimensions)?;
        let query_provider = options
            .provider
            .clone()
            .map(|inner| Arc::new(CachedQueryProvider::new(inner)));

        Ok(Self {
            store,
            provider: options.provider,
            query_provider,
            injector: ContextInjector::with_config(options.injector),
            maintenance: Maintenance::with_config(options.maintenance),
            horizon: HorizonEstimator::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Direct access to the underlying store
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Whether semantic retrieval is currently possible
    pub fn semantic_ready(&self) -> bool {
        self.store.has_vector_index()
            && self.provider.as_ref().is_some_and(|p| p.is_available())
    }

    // ------------------------------------------------------------------
    // Convenience operations
    // ------------------------------------------------------------------

    /// Store a fact, returning the new chunk id
    ///
    /// Applies defaults (short-term tier, 0.7 confidence, retention-derived
    /// expiry, generated summary) and computes an embedding when a provider
    /// is available. Embedding failure is non-fatal: the chunk is stored
    /// without a vector and a warning is logged.
    pub fn remember(&self, content: &str, options: RememberOptions) -> Result<String> {
        self.ensure_open()?;

        if content.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "Cannot remember empty content".to_string(),
            ));
        }

        let tier = options.tier.unwrap_or(Tier::ShortTerm);

        let expires_at = match (options.expires_at, tier) {
            (Some(at), _) => Some(at),
            (None, Tier::ShortTerm) => {
                Some(Utc::now() + self.maintenance.config().retention)
            }
            (None, _) => None,
        };

        let mut metadata = options.metadata.unwrap_or_default();
        if options.important {
            metadata.insert("important".to_string(), Value::from(true));
        }

        let mut input = ChunkInput {
            content: content.to_string(),
            tier,
            summary: Some(
                options
                    .summary
                    .unwrap_or_else(|| generate_summary(content, SUMMARY_MAX_CHARS)),
            ),
            source: options.source,
            category: options.category,
            person: options.person,
            tags: options.tags.unwrap_or_default(),
            confidence: options.confidence.unwrap_or(DEFAULT_REMEMBER_CONFIDENCE),
            expires_at,
            metadata,
            ..Default::default()
        };

        if options.predict_horizon {
            let prediction = self.horizon.estimate(&input, Utc::now());
            apply_prediction(&mut input, &prediction);
        }

        let tags = input.tags.clone();
        let embedding = self.embed_content(content);
        let chunk = self.store.insert(input, embedding.as_deref())?;

        self.index_tag_embeddings(&tags);

        Ok(chunk.id)
    }

    /// Upsert embeddings for new tag values; best-effort
    fn index_tag_embeddings(&self, tags: &StructuredTags) {
        let Some(provider) = self.provider.as_ref() else {
            return;
        };
        if tags.is_empty() || !provider.is_available() || !self.store.has_vector_index() {
            return;
        }

        for dimension in TagDimension::ALL {
            for value in tags.dimension(dimension) {
                match self.store.tag_embedding(value, dimension) {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Tag embedding lookup for {:?} failed: {}", value, e);
                        continue;
                    }
                }
                match provider.embed(value) {
                    Ok(vector) => {
                        if let Err(e) =
                            self.store.upsert_tag_embedding(value, dimension, &vector)
                        {
                            tracing::warn!("Tag embedding upsert for {:?} failed: {}", value, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Tag embedding for {:?} failed: {}", value, e);
                    }
                }
            }
        }
    }

    /// Retrieve chunks matching a query; scores are stripped
    ///
    /// The modality degrades with capability: hybrid and semantic fall
    /// back to text-only retrieval when no vector path exists.
    pub fn recall(&self, query: &str, options: RecallOptions) -> Result<Vec<Chunk>> {
        self.ensure_open()?;

        let query_embedding = match options.mode {
            SearchMode::Text => None,
            SearchMode::Semantic | SearchMode::Hybrid => self.embed_query(query),
        };

        let results = match options.mode {
            SearchMode::Text => {
                self.store
                    .search_text(query, options.limit, &options.filter)?
            }
            SearchMode::Semantic => match query_embedding {
                Some(vector) => {
                    self.store
                        .search_vector(&vector, options.limit, &options.filter)?
                }
                None => self
                    .store
                    .search_text(query, options.limit, &options.filter)?,
            },
            SearchMode::Hybrid => self.store.search_hybrid(
                query,
                query_embedding.as_deref(),
                options.limit,
                &options.filter,
                &self.injector.config().hybrid,
            )?,
        };

        let chunks: Vec<Chunk> = results.into_iter().map(|r| r.chunk).collect();

        // Best-effort access accounting feeds the promotion cycle
        for chunk in &chunks {
            if let Err(e) = self.store.touch_access(&chunk.id) {
                tracing::warn!("Access bump failed for {}: {}", chunk.id, e);
            }
        }

        Ok(chunks)
    }

    /// Delete a chunk; idempotent
    pub fn forget(&self, id: &str) -> Result<bool> {
        self.ensure_open()?;
        self.store.delete(id)
    }

    /// Promote a chunk to long-term
    pub fn promote_to_long_term(&self, id: &str) -> Result<Chunk> {
        self.ensure_open()?;
        self.store
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.store.promote(id, Tier::LongTerm)
    }

    /// Partially update a chunk
    pub fn update(&self, id: &str, patch: ChunkPatch) -> Result<Chunk> {
        self.ensure_open()?;
        let embedding = patch
            .content
            .as_deref()
            .and_then(|content| self.embed_content(content));
        self.store.update(id, patch, embedding.as_deref())
    }

    // ------------------------------------------------------------------
    // Working memory
    // ------------------------------------------------------------------

    /// Drop a note into the working tier for one conversation
    ///
    /// Working chunks are the injector's scratchpad: fetched by recency,
    /// never decayed, torn down with [`Memory::clear_working`] when the
    /// conversation ends.
    pub fn note_working(&self, session_id: &str, content: &str) -> Result<String> {
        self.remember(
            content,
            RememberOptions {
                tier: Some(Tier::Working),
                source: Some(session_id.to_string()),
                ..Default::default()
            },
        )
    }

    /// Remove every working chunk of one conversation; returns the count
    pub fn clear_working(&self, session_id: &str) -> Result<i64> {
        self.ensure_open()?;
        self.store
            .delete_by_tier_and_source(Tier::Working, session_id)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Run the decay cycle; returns the affected count
    pub fn run_decay_cycle(&self) -> Result<i64> {
        self.ensure_open()?;
        self.maintenance.run_decay_cycle(&self.store)
    }

    /// Run the promotion cycle; returns the promoted count
    pub fn run_promotion_cycle(&self) -> Result<i64> {
        self.ensure_open()?;
        self.maintenance.run_promotion_cycle(&self.store)
    }

    /// Run every maintenance cycle
    pub fn run_maintenance(&self) -> Result<MaintenanceSummary> {
        self.ensure_open()?;
        self.maintenance.run_all(&self.store)
    }

    // ------------------------------------------------------------------
    // Context
    // ------------------------------------------------------------------

    /// Assemble a context block for one conversational turn
    pub fn assemble_context(&self, signals: &QuerySignals) -> Result<AssembledContext> {
        self.ensure_open()?;
        let provider = self
            .query_provider
            .as_deref()
            .map(|p| p as &dyn EmbeddingProvider);
        self.injector.assemble(&self.store, provider, signals)
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Stored tags semantically similar to a query string
    pub fn find_similar_tags(
        &self,
        query: &str,
        dimension: Option<TagDimension>,
        limit: usize,
    ) -> Result<Vec<TagMatch>> {
        self.ensure_open()?;
        let Some(vector) = self.embed_query(query) else {
            return Ok(vec![]);
        };
        find_similar_tags(&self.store, &vector, dimension, MIN_TAG_SIMILARITY, limit)
    }

    /// Exact and semantic tag matches for a query string
    pub fn search_tags(
        &self,
        query: &str,
        dimension: Option<TagDimension>,
        limit: usize,
    ) -> Result<Vec<TagMatch>> {
        self.ensure_open()?;
        let vector = self.embed_query(query);
        hybrid_tag_search(&self.store, query, vector.as_deref(), dimension, limit)
    }

    // ------------------------------------------------------------------
    // Backup & backfill
    // ------------------------------------------------------------------

    /// Export every chunk as JSON lines; returns the count written
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<i64> {
        self.ensure_open()?;
        export_to_path(&self.store, path)
    }

    /// Restore chunks from a JSON-lines export; existing ids are skipped
    pub fn restore_from(&self, path: impl AsRef<Path>) -> Result<RestoreReport> {
        self.ensure_open()?;
        restore_from_path(&self.store, path)
    }

    /// Generate embeddings for up to `limit` chunks that lack one
    ///
    /// Per-chunk failures are logged and skipped; returns the number of
    /// vectors attached.
    pub fn backfill_embeddings(&self, limit: i64) -> Result<i64> {
        self.ensure_open()?;

        let Some(provider) = self.provider.as_ref() else {
            return Ok(0);
        };
        if !provider.is_available() || !self.store.has_vector_index() {
            return Ok(0);
        }

        let mut attached = 0i64;
        for chunk in self.store.chunks_missing_embeddings(limit)? {
            if chunk.content.is_empty() {
                continue;
            }
            match provider.embed(&chunk.content) {
                Ok(vector) => match self.store.attach_embedding(&chunk.id, &vector) {
                    Ok(()) => attached += 1,
                    Err(e) => {
                        tracing::warn!("Backfill attach for {} failed: {}", chunk.id, e)
                    }
                },
                Err(e) => tracing::warn!("Backfill embed for {} failed: {}", chunk.id, e),
            }
        }

        Ok(attached)
    }

    // ------------------------------------------------------------------
    // Thin delegates
    // ------------------------------------------------------------------

    /// Store statistics
    pub fn stats(&self) -> Result<MemoryStats> {
        self.ensure_open()?;
        self.store.stats()
    }

    /// Health and capability snapshot
    ///
    /// Unlike the other operations this stays readable after `close`, so
    /// operators can still inspect a shut-down engine.
    pub fn system_report(&self) -> Result<SystemReport> {
        Ok(SystemReport {
            version: crate::VERSION.to_string(),
            stats: self.store.stats()?,
            semantic_ready: self.semantic_ready(),
            vector_index: self.store.has_vector_index(),
            embedding_model: self
                .provider
                .as_ref()
                .map(|p| p.model_id().to_string()),
            dimensions: self.store.dimensions(),
            closed: self.is_closed(),
        })
    }

    /// Fetch one chunk
    pub fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        self.ensure_open()?;
        self.store.get(id)
    }

    /// Paginated tier scan
    pub fn get_by_tier(&self, tier: Tier, options: &ListOptions) -> Result<Vec<Chunk>> {
        self.ensure_open()?;
        self.store.get_by_tier(tier, options)
    }

    /// Paginated subject scan
    pub fn get_by_person(&self, person: &str, options: &ListOptions) -> Result<Vec<Chunk>> {
        self.ensure_open()?;
        self.store.get_by_person(person, options)
    }

    /// Chunks created inside a half-open time window
    pub fn get_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        options: &ListOptions,
    ) -> Result<Vec<Chunk>> {
        self.ensure_open()?;
        self.store.get_by_time_range(from, to, options)
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Shut the engine down; idempotent, but every other call afterwards
    /// fails with `Closed`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether the engine has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn embed_content(&self, content: &str) -> Option<Vec<f32>> {
        let provider = self.provider.as_ref()?;
        if content.is_empty() || !provider.is_available() || !self.store.has_vector_index() {
            return None;
        }
        match provider.embed(content) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Embedding failed, storing without vector: {}", e);
                None
            }
        }
    }

    /// Query-path embedding, through the LRU cache
    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let provider = self.query_provider.as_ref()?;
        if query.is_empty() || !provider.is_available() || !self.store.has_vector_index() {
            return None;
        }
        match provider.embed(query) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Query embedding failed, degrading to text search: {}", e);
                None
            }
        }
    }
}

/// Truncate at a word boundary to at most `max` characters, with an
/// ellipsis when anything was cut
fn generate_summary(content: &str, max: usize) -> String {
    let trimmed = content.trim();
    let line = trimmed.lines().next().unwrap_or(trimmed);

    if line.chars().count() <= max {
        return line.to_string();
    }

    let cut: String = line.chars().take(max).collect();
    let boundary = cut.rfind(char::is_whitespace).unwrap_or(cut.len());
    let head = cut[..boundary].trim_end();
    if head.is_empty() {
        format!("{}…", cut.trim_end())
    } else {
        format!("{}…", head)
    }
}

// ============================================================================
// TESTS
// ============================================================================
