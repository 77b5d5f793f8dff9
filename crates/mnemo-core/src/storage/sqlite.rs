//! SQLite Chunk Store
//!
//! Transactional persistence of memory chunks with synchronized inverted
//! (FTS5) and vector indexes.
//!
//! The store opens two connections to the same database: a writer and a
//! reader, each behind a `Mutex`, so all methods take `&self` and the
//! store is `Send + Sync`. Writes are serialized through the writer lock;
//! WAL mode keeps readers concurrent. FTS rows are maintained by triggers;
//! vector rows live in `chunk_embeddings` with `ON DELETE CASCADE`, and
//! the in-memory HNSW index mirrors that table (rebuilt at open).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::embeddings::{Embedding, NORM_TOLERANCE};
use crate::memory::{
    Chunk, ChunkFilter, ChunkInput, ChunkPatch, HorizonCategory, ListOptions, MemoryStats,
    SearchResult, StructuredTags, TagDimension, Tier,
};
use crate::search::{build_fts_query, merge_candidates, rank_to_score, sort_results, HybridConfig};

#[cfg(feature = "vector-search")]
use crate::search::{apply_tag_boost, distance_to_score, VectorIndex, VectorIndexConfig};

#[cfg(not(feature = "vector-search"))]
use crate::search::apply_tag_boost;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Chunk or record not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Tier value outside the enum
    #[error("Invalid tier: {0}")]
    InvalidTier(String),
    /// Transition forbidden by the tier state machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current tier
        from: Tier,
        /// Requested tier
        to: Tier,
    },
    /// Bad caller input (empty id, dimension mismatch, out-of-range value)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Embedding provider failure
    #[error("Provider error: {0}")]
    Provider(String),
    /// Index desynchronization detected on read
    #[error("Integrity error: {0}")]
    Integrity(String),
    /// Operation on a shut-down system
    #[error("Memory system is closed")]
    Closed,
    /// Persistent file unreadable or schema incompatible
    #[error("Corrupt store: {0}")]
    Corrupt(String),
    /// Initialization failure (paths, locks, index creation)
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Store result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// STORE
// ============================================================================

/// Chunk store over an embedded SQLite database
pub struct ChunkStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    #[cfg(feature = "vector-search")]
    vector_index: Mutex<Option<VectorIndex>>,
    dimensions: usize,
}

impl ChunkStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )?;
        Ok(())
    }

    /// Open (or create) a store at `path` with the default vector dimension
    ///
    /// The special path `:memory:` keeps the same schema in a process-local
    /// in-memory database. Parent directories are created as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_dimensions(path, crate::embeddings::EMBEDDING_DIMENSIONS)
    }

    /// Open with an explicit vector dimension
    pub fn open_with_dimensions(path: impl AsRef<Path>, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(StoreError::InvalidArgument(
                "Vector dimension must be positive".to_string(),
            ));
        }

        let path = path.as_ref();
        let in_memory = path == Path::new(":memory:");

        // The reader/writer pair must address one database. On disk that is
        // the file path; in memory it is a named shared-cache URI.
        let uri: String = if in_memory {
            format!(
                "file:mnemo-{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            )
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            path.to_string_lossy().into_owned()
        };

        let flags = if in_memory {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
        } else {
            OpenFlags::default()
        };

        let writer_conn = Connection::open_with_flags(&uri, flags)
            .map_err(|e| StoreError::Corrupt(format!("Cannot open database: {}", e)))?;
        Self::configure_connection(&writer_conn)?;

        super::migrations::apply_migrations(&writer_conn)
            .map_err(|e| StoreError::Corrupt(format!("Migration failed: {}", e)))?;

        let reader_conn = Connection::open_with_flags(&uri, flags)
            .map_err(|e| StoreError::Corrupt(format!("Cannot open database: {}", e)))?;
        Self::configure_connection(&reader_conn)?;

        #[cfg(feature = "vector-search")]
        let vector_index = match VectorIndex::with_config(VectorIndexConfig {
            dimensions,
            ..VectorIndexConfig::default()
        }) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!("Vector index unavailable, degrading to text-only: {}", e);
                None
            }
        };

        let store = Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            #[cfg(feature = "vector-search")]
            vector_index: Mutex::new(vector_index),
            dimensions,
        };

        #[cfg(feature = "vector-search")]
        store.load_embeddings_into_index()?;

        Ok(store)
    }

    /// Configured vector dimension
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Whether vector search is available
    #[cfg(feature = "vector-search")]
    pub fn has_vector_index(&self) -> bool {
        self.vector_index
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Whether vector search is available
    #[cfg(not(feature = "vector-search"))]
    pub fn has_vector_index(&self) -> bool {
        false
    }

    /// Rebuild the in-memory index from the embeddings table
    #[cfg(feature = "vector-search")]
    fn load_embeddings_into_index(&self) -> Result<()> {
        let rows: Vec<(String, Vec<u8>)> = {
            let reader = self.lock_reader()?;
            let mut stmt =
                reader.prepare("SELECT chunk_id, embedding FROM chunk_embeddings")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(std::result::Result::ok)
                .collect();
            rows
        };

        let mut guard = self.lock_index()?;
        let Some(index) = guard.as_mut() else {
            return Ok(());
        };

        for (chunk_id, bytes) in rows {
            if let Some(embedding) = Embedding::from_bytes(&bytes) {
                if embedding.dimensions != self.dimensions {
                    tracing::warn!(
                        "Skipping embedding for {}: dimension {} != {}",
                        chunk_id,
                        embedding.dimensions,
                        self.dimensions
                    );
                    continue;
                }
                if let Err(e) = index.add(&chunk_id, &embedding.vector) {
                    tracing::warn!("Failed to load embedding for {}: {}", chunk_id, e);
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lock helpers
    // ------------------------------------------------------------------

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))
    }

    fn lock_reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))
    }

    #[cfg(feature = "vector-search")]
    fn lock_index(&self) -> Result<std::sync::MutexGuard<'_, Option<VectorIndex>>> {
        self.vector_index
            .lock()
            .map_err(|_| StoreError::Init("Vector index lock poisoned".into()))
    }

    // ------------------------------------------------------------------
    // Validation helpers
    // ------------------------------------------------------------------

    fn validate_embedding(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(StoreError::InvalidArgument(format!(
                "Embedding dimension {} does not match store dimension {}",
                vector.len(),
                self.dimensions
            )));
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if (norm - 1.0).abs() >= NORM_TOLERANCE {
            return Err(StoreError::InvalidArgument(format!(
                "Embedding is not unit-length (norm {:.4})",
                norm
            )));
        }
        Ok(())
    }

    fn validate_confidence(confidence: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
            return Err(StoreError::InvalidArgument(format!(
                "Confidence {} outside [0, 1]",
                confidence
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Insert a new chunk, returning it with its generated id
    ///
    /// Runs as one transaction over the base row, the inverted-index row
    /// (trigger-maintained), and — iff an embedding is provided and vector
    /// capability is available — the vector row.
    pub fn insert(&self, input: ChunkInput, embedding: Option<&[f32]>) -> Result<Chunk> {
        Self::validate_confidence(input.confidence)?;
        if let Some(vector) = embedding {
            self.validate_embedding(vector)?;
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tags = input.tags;
        tags.normalize();
        let tags_flat = tags.flatten().join(" ");

        let store_vector = embedding.is_some() && self.has_vector_index();
        let metadata_json = serde_json::to_string(&input.metadata)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metadata: {}", e)))?;

        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;

            tx.execute(
                "INSERT INTO chunks (
                    id, tier, content, summary, source, category, person,
                    tags, tags_flat, confidence, created_at, updated_at,
                    promoted_at, expires_at, metadata,
                    relevance_horizon, horizon_reasoning, horizon_confidence, horizon_category,
                    has_embedding, embedding_model
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19,
                    ?20, ?21
                )",
                params![
                    id,
                    input.tier.as_str(),
                    input.content,
                    input.summary,
                    input.source,
                    input.category,
                    input.person,
                    tags.to_json(),
                    tags_flat,
                    input.confidence,
                    now.timestamp_millis(),
                    now.timestamp_millis(),
                    Option::<i64>::None,
                    input.expires_at.map(|t| t.timestamp_millis()),
                    metadata_json,
                    input.relevance_horizon.map(|t| t.timestamp_millis()),
                    input.horizon_reasoning,
                    input.horizon_confidence,
                    input.horizon_category.map(|c| c.as_str()),
                    store_vector as i64,
                    Option::<String>::None,
                ],
            )?;

            if store_vector {
                let blob = Embedding::new(embedding.unwrap_or_default().to_vec()).to_bytes();
                tx.execute(
                    "INSERT INTO chunk_embeddings (chunk_id, embedding, dimensions, model, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        blob,
                        self.dimensions as i64,
                        Option::<String>::None,
                        now.timestamp_millis()
                    ],
                )?;
            }

            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        if store_vector {
            if let Some(vector) = embedding {
                let mut guard = self.lock_index()?;
                if let Some(index) = guard.as_mut() {
                    index
                        .add(&id, vector)
                        .map_err(|e| StoreError::Integrity(format!("Vector index add: {}", e)))?;
                }
            }
        }

        self.get(&id)?.ok_or(StoreError::NotFound(id))
    }

    /// Get a chunk by id
    pub fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare("SELECT * FROM chunks WHERE id = ?1")?;
        let chunk = stmt
            .query_row(params![id], |row| Self::row_to_chunk(row))
            .optional()?;
        Ok(chunk)
    }

    /// Partially update an existing chunk
    ///
    /// Merges the patch into the base row in one transaction. The FTS row
    /// is deleted and re-inserted (trigger-maintained) whenever indexed
    /// text changes; a provided embedding replaces the vector row.
    /// `updated_at` always advances; a tier increase sets `promoted_at`.
    pub fn update(
        &self,
        id: &str,
        patch: ChunkPatch,
        embedding: Option<&[f32]>,
    ) -> Result<Chunk> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument("Empty chunk id".to_string()));
        }
        if let Some(confidence) = patch.confidence {
            Self::validate_confidence(confidence)?;
        }
        if let Some(vector) = embedding {
            self.validate_embedding(vector)?;
        }

        let existing = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let now = Utc::now();
        // Monotonic under clock skew
        let updated_at = now.max(existing.updated_at);

        let tier = patch.tier.unwrap_or(existing.tier);
        let promoted_at = if existing.tier.can_promote_to(tier) {
            Some(updated_at)
        } else {
            existing.promoted_at
        };

        let mut tags = patch.tags.unwrap_or_else(|| existing.tags.clone());
        tags.normalize();
        let tags_flat = tags.flatten().join(" ");

        let content = patch.content.unwrap_or_else(|| existing.content.clone());
        let summary = patch.summary.or_else(|| existing.summary.clone());
        let source = patch.source.or_else(|| existing.source.clone());
        let category = patch.category.or_else(|| existing.category.clone());
        let person = patch.person.or_else(|| existing.person.clone());
        let confidence = patch.confidence.unwrap_or(existing.confidence);
        let expires_at = patch.expires_at.or(existing.expires_at);
        let metadata = patch.metadata.unwrap_or_else(|| existing.metadata.clone());
        let relevance_horizon = patch.relevance_horizon.or(existing.relevance_horizon);
        let horizon_reasoning = patch
            .horizon_reasoning
            .or_else(|| existing.horizon_reasoning.clone());
        let horizon_confidence = patch.horizon_confidence.or(existing.horizon_confidence);
        let horizon_category = patch.horizon_category.or(existing.horizon_category);

        let store_vector = embedding.is_some() && self.has_vector_index();
        let has_embedding = existing.has_embedding || store_vector;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metadata: {}", e)))?;

        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;

            let changed = tx.execute(
                "UPDATE chunks SET
                    tier = ?1, content = ?2, summary = ?3, source = ?4,
                    category = ?5, person = ?6, tags = ?7, tags_flat = ?8,
                    confidence = ?9, updated_at = ?10, promoted_at = ?11,
                    expires_at = ?12, metadata = ?13,
                    relevance_horizon = ?14, horizon_reasoning = ?15,
                    horizon_confidence = ?16, horizon_category = ?17,
                    has_embedding = ?18
                 WHERE id = ?19",
                params![
                    tier.as_str(),
                    content,
                    summary,
                    source,
                    category,
                    person,
                    tags.to_json(),
                    tags_flat,
                    confidence,
                    updated_at.timestamp_millis(),
                    promoted_at.map(|t| t.timestamp_millis()),
                    expires_at.map(|t| t.timestamp_millis()),
                    metadata_json,
                    relevance_horizon.map(|t| t.timestamp_millis()),
                    horizon_reasoning,
                    horizon_confidence,
                    horizon_category.map(|c| c.as_str()),
                    has_embedding as i64,
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }

            if store_vector {
                let blob = Embedding::new(embedding.unwrap_or_default().to_vec()).to_bytes();
                tx.execute(
                    "INSERT OR REPLACE INTO chunk_embeddings
                        (chunk_id, embedding, dimensions, model, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        blob,
                        self.dimensions as i64,
                        Option::<String>::None,
                        now.timestamp_millis()
                    ],
                )?;
            }

            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        if store_vector {
            if let Some(vector) = embedding {
                let mut guard = self.lock_index()?;
                if let Some(index) = guard.as_mut() {
                    index
                        .add(id, vector)
                        .map_err(|e| StoreError::Integrity(format!("Vector index add: {}", e)))?;
                }
            }
        }

        self.get(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Delete a chunk, cascading to both indexes; idempotent
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = {
            let writer = self.lock_writer()?;
            writer.execute("DELETE FROM chunks WHERE id = ?1", params![id])? > 0
        };

        #[cfg(feature = "vector-search")]
        {
            let mut guard = self.lock_index()?;
            if let Some(index) = guard.as_mut() {
                let _ = index
                    .remove(id)
                    .map_err(|e| tracing::warn!("Vector index remove for {}: {}", id, e));
            }
        }

        Ok(deleted)
    }

    /// Promote a chunk to a strictly higher tier
    pub fn promote(&self, id: &str, target: Tier) -> Result<Chunk> {
        let existing = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !existing.tier.can_promote_to(target) {
            return Err(StoreError::InvalidTransition {
                from: existing.tier,
                to: target,
            });
        }

        let now = Utc::now().max(existing.updated_at);
        {
            let writer = self.lock_writer()?;
            writer.execute(
                "UPDATE chunks SET tier = ?1, promoted_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    target.as_str(),
                    now.timestamp_millis(),
                    now.timestamp_millis(),
                    id
                ],
            )?;
        }

        self.get(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Increment `metadata.accessCount` (the external access contract)
    pub fn touch_access(&self, id: &str) -> Result<()> {
        let Some(mut chunk) = self.get(id)? else {
            return Ok(());
        };
        let count = chunk.access_count() + 1;
        chunk
            .metadata
            .insert("accessCount".to_string(), serde_json::Value::from(count));

        let metadata_json = serde_json::to_string(&chunk.metadata)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metadata: {}", e)))?;
        let now = Utc::now().max(chunk.updated_at);

        let writer = self.lock_writer()?;
        writer.execute(
            "UPDATE chunks SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            params![metadata_json, now.timestamp_millis(), id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Paginated scan of one tier
    pub fn get_by_tier(&self, tier: Tier, options: &ListOptions) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT * FROM chunks WHERE tier = ?1 ORDER BY {} {} LIMIT ?2 OFFSET ?3",
            options.order_by.column(),
            options.order.keyword()
        );

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let chunks = stmt
            .query_map(params![tier.as_str(), options.limit, options.offset], |row| {
                Self::row_to_chunk(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Paginated scan of one compartmentalization subject (exact match)
    pub fn get_by_person(&self, person: &str, options: &ListOptions) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT * FROM chunks WHERE person = ?1 ORDER BY {} {} LIMIT ?2 OFFSET ?3",
            options.order_by.column(),
            options.order.keyword()
        );

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let chunks = stmt
            .query_map(params![person, options.limit, options.offset], |row| {
                Self::row_to_chunk(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Paginated scan over every chunk
    pub fn get_all(&self, options: &ListOptions) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT * FROM chunks ORDER BY {} {} LIMIT ?1 OFFSET ?2",
            options.order_by.column(),
            options.order.keyword()
        );

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let chunks = stmt
            .query_map(params![options.limit, options.offset], |row| {
                Self::row_to_chunk(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Chunks created inside a half-open time window
    pub fn get_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        options: &ListOptions,
    ) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT * FROM chunks WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY {} {} LIMIT ?3 OFFSET ?4",
            options.order_by.column(),
            options.order.keyword()
        );

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let chunks = stmt
            .query_map(
                params![
                    from.timestamp_millis(),
                    to.timestamp_millis(),
                    options.limit,
                    options.offset
                ],
                |row| Self::row_to_chunk(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Re-insert a chunk verbatim (backup restore path)
    ///
    /// Ids and timestamps are preserved; an existing id is left untouched
    /// and the call returns false. Vectors are not restored - regenerate
    /// them from content afterwards.
    pub fn restore(&self, chunk: &Chunk) -> Result<bool> {
        if chunk.id.is_empty() {
            return Err(StoreError::InvalidArgument("Empty chunk id".to_string()));
        }
        Self::validate_confidence(chunk.confidence)?;

        let mut tags = chunk.tags.clone();
        tags.normalize();
        let tags_flat = tags.flatten().join(" ");
        let metadata_json = serde_json::to_string(&chunk.metadata)
            .map_err(|e| StoreError::InvalidArgument(format!("Unencodable metadata: {}", e)))?;

        let writer = self.lock_writer()?;
        let inserted = writer.execute(
            "INSERT OR IGNORE INTO chunks (
                id, tier, content, summary, source, category, person,
                tags, tags_flat, confidence, created_at, updated_at,
                promoted_at, expires_at, metadata,
                relevance_horizon, horizon_reasoning, horizon_confidence, horizon_category,
                has_embedding, embedding_model
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18, ?19,
                0, NULL
            )",
            params![
                chunk.id,
                chunk.tier.as_str(),
                chunk.content,
                chunk.summary,
                chunk.source,
                chunk.category,
                chunk.person,
                tags.to_json(),
                tags_flat,
                chunk.confidence,
                chunk.created_at.timestamp_millis(),
                chunk.updated_at.timestamp_millis(),
                chunk.promoted_at.map(|t| t.timestamp_millis()),
                chunk.expires_at.map(|t| t.timestamp_millis()),
                metadata_json,
                chunk.relevance_horizon.map(|t| t.timestamp_millis()),
                chunk.horizon_reasoning,
                chunk.horizon_confidence,
                chunk.horizon_category.map(|c| c.as_str()),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Chunks without a vector row, oldest first (embedding backfill scan)
    pub fn chunks_missing_embeddings(&self, limit: i64) -> Result<Vec<Chunk>> {
        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM chunks WHERE has_embedding = 0 ORDER BY created_at LIMIT ?1",
        )?;
        let chunks = stmt
            .query_map(params![limit], |row| Self::row_to_chunk(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Attach an embedding to an existing chunk (backfill path)
    pub fn attach_embedding(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.validate_embedding(vector)?;
        if !self.has_vector_index() {
            return Ok(());
        }
        if self.get(id)?.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let now = Utc::now();
        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO chunk_embeddings
                    (chunk_id, embedding, dimensions, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    Embedding::new(vector.to_vec()).to_bytes(),
                    self.dimensions as i64,
                    Option::<String>::None,
                    now.timestamp_millis()
                ],
            )?;
            tx.execute(
                "UPDATE chunks SET has_embedding = 1 WHERE id = ?1",
                params![id],
            )?;
            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        {
            let mut guard = self.lock_index()?;
            if let Some(index) = guard.as_mut() {
                index
                    .add(id, vector)
                    .map_err(|e| StoreError::Integrity(format!("Vector index add: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Store statistics
    pub fn stats(&self) -> Result<MemoryStats> {
        let reader = self.lock_reader()?;

        let total: i64 = reader.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let mut by_tier = std::collections::BTreeMap::new();
        {
            let mut stmt = reader.prepare("SELECT tier, COUNT(*) FROM chunks GROUP BY tier")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (tier, count) = row?;
                by_tier.insert(tier, count);
            }
        }

        let mut by_category = std::collections::BTreeMap::new();
        {
            let mut stmt = reader.prepare(
                "SELECT category, COUNT(*) FROM chunks WHERE category IS NOT NULL GROUP BY category",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (category, count) = row?;
                by_category.insert(category, count);
            }
        }

        let mut by_person = std::collections::BTreeMap::new();
        {
            let mut stmt = reader.prepare(
                "SELECT person, COUNT(*) FROM chunks WHERE person IS NOT NULL GROUP BY person",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (person, count) = row?;
                by_person.insert(person, count);
            }
        }

        let oldest: Option<i64> =
            reader.query_row("SELECT MIN(created_at) FROM chunks", [], |row| row.get(0))?;
        let newest: Option<i64> =
            reader.query_row("SELECT MAX(created_at) FROM chunks", [], |row| row.get(0))?;

        let chunks_with_embeddings: i64 = reader.query_row(
            "SELECT COUNT(*) FROM chunk_embeddings",
            [],
            |row| row.get(0),
        )?;

        let page_count: i64 = reader.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = reader.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(MemoryStats {
            total_chunks: total,
            by_tier,
            by_category,
            by_person,
            oldest_chunk: oldest.and_then(DateTime::from_timestamp_millis),
            newest_chunk: newest.and_then(DateTime::from_timestamp_millis),
            chunks_with_embeddings,
            disk_bytes: page_count * page_size,
        })
    }

    // ------------------------------------------------------------------
    // Search primitives
    // ------------------------------------------------------------------

    /// Raw FTS candidates as (chunk id, similarity)
    ///
    /// BM25 rank is negative-valued; `|r| / (1 + |r|)` maps it to [0, 1).
    pub fn text_candidates(&self, query: &str, limit: i64) -> Result<Vec<(String, f32)>> {
        let Some(match_expr) = build_fts_query(query) else {
            return Ok(vec![]);
        };

        let reader = self.lock_reader()?;
        let mut stmt = reader.prepare(
            "SELECT c.id, rank FROM chunks c
             JOIN chunk_fts fts ON c.id = fts.id
             WHERE chunk_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;

        let results = stmt
            .query_map(params![match_expr, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .filter_map(std::result::Result::ok)
            .map(|(id, rank)| (id, rank_to_score(rank)))
            .collect();

        Ok(results)
    }

    /// Raw vector candidates as (chunk id, similarity) via `1 / (1 + d)`
    ///
    /// Empty when vector capability is unavailable.
    #[cfg(feature = "vector-search")]
    pub fn vector_candidates(&self, query: &[f32], limit: i64) -> Result<Vec<(String, f32)>> {
        let guard = self.lock_index()?;
        let Some(index) = guard.as_ref() else {
            return Ok(vec![]);
        };

        let results = index
            .search(query, limit.max(0) as usize)
            .map_err(|e| StoreError::Integrity(format!("Vector search: {}", e)))?;

        Ok(results
            .into_iter()
            .map(|(id, distance)| (id, distance_to_score(distance)))
            .collect())
    }

    /// Raw vector candidates (capability absent: always empty)
    #[cfg(not(feature = "vector-search"))]
    pub fn vector_candidates(&self, _query: &[f32], _limit: i64) -> Result<Vec<(String, f32)>> {
        Ok(vec![])
    }

    /// Load candidates as chunks, apply the shared filter, truncate
    fn resolve_candidates(
        &self,
        candidates: Vec<(String, f32)>,
        filter: &ChunkFilter,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::new();
        for (id, score) in candidates {
            let Some(chunk) = self.get(&id)? else {
                // Index row without a base row violates I1
                return Err(StoreError::Integrity(format!(
                    "Index entry references missing chunk {}",
                    id
                )));
            };
            if !filter.matches(&chunk) {
                continue;
            }
            results.push(SearchResult {
                text_score: None,
                vector_score: None,
                combined_score: score,
                match_type: crate::memory::MatchType::Text,
                chunk,
            });
            if results.len() as i64 >= limit {
                break;
            }
        }
        Ok(results)
    }

    /// Full-text search over the inverted index
    pub fn search_text(
        &self,
        query: &str,
        limit: i64,
        filter: &ChunkFilter,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self.text_candidates(query, limit * 2)?;
        let mut results = self.resolve_candidates(candidates, filter, limit)?;
        for result in &mut results {
            result.text_score = Some(result.combined_score);
        }
        Ok(results)
    }

    /// Vector nearest-neighbor search (2× over-fetch before filtering)
    pub fn search_vector(
        &self,
        query: &[f32],
        limit: i64,
        filter: &ChunkFilter,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self.vector_candidates(query, limit * 2)?;
        let mut results = self.resolve_candidates(candidates, filter, limit)?;
        for result in &mut results {
            result.vector_score = Some(result.combined_score);
            result.match_type = crate::memory::MatchType::Vector;
        }
        Ok(results)
    }

    /// Hybrid search: weighted fusion of both modalities
    ///
    /// Both sources over-fetch by `config.overfetch` with no minimum-score
    /// gate; component scores merge by chunk id (missing = 0) into
    /// `w_v * s_v + w_t * s_t`. Ties break by newer `updated_at`, then id.
    pub fn search_hybrid(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        limit: i64,
        filter: &ChunkFilter,
        config: &HybridConfig,
    ) -> Result<Vec<SearchResult>> {
        let fetch = limit * config.overfetch;
        let text_results = self.text_candidates(query, fetch)?;
        let vector_results = match query_embedding {
            Some(vector) => self.vector_candidates(vector, fetch)?,
            None => vec![],
        };

        let merged = merge_candidates(&text_results, &vector_results);

        let mut results = Vec::with_capacity(merged.len());
        for (id, scores) in merged {
            let Some(chunk) = self.get(&id)? else {
                return Err(StoreError::Integrity(format!(
                    "Index entry references missing chunk {}",
                    id
                )));
            };
            if !filter.matches(&chunk) {
                continue;
            }
            results.push(SearchResult {
                text_score: scores.text,
                vector_score: scores.vector,
                combined_score: scores.combined(config),
                match_type: scores.match_type(),
                chunk,
            });
        }

        sort_results(&mut results);
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }

    /// Hybrid search with a multiplicative boost on structured-tag matches
    pub fn search_hybrid_boosted(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        limit: i64,
        filter: &ChunkFilter,
        boost: &StructuredTags,
        config: &HybridConfig,
    ) -> Result<Vec<SearchResult>> {
        let mut results = self.search_hybrid(query, query_embedding, limit, filter, config)?;
        apply_tag_boost(&mut results, boost, config.tag_boost);
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Maintenance primitives
    // ------------------------------------------------------------------

    /// Hard-delete every chunk whose `expires_at` has passed
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<i64> {
        let expired: Vec<String> = {
            let reader = self.lock_reader()?;
            let mut stmt = reader
                .prepare("SELECT id FROM chunks WHERE expires_at IS NOT NULL AND expires_at < ?1")?;
            let ids = stmt
                .query_map(params![now.timestamp_millis()], |row| row.get(0))?
                .filter_map(std::result::Result::ok)
                .collect();
            ids
        };

        if expired.is_empty() {
            return Ok(0);
        }

        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;
            for id in &expired {
                tx.execute("DELETE FROM chunks WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        {
            let mut guard = self.lock_index()?;
            if let Some(index) = guard.as_mut() {
                for id in &expired {
                    let _ = index.remove(id);
                }
            }
        }

        Ok(expired.len() as i64)
    }

    /// Demote short-term chunks inactive since `cutoff` to episodic
    pub fn demote_stale_short_term(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let writer = self.lock_writer()?;
        let changed = writer.execute(
            "UPDATE chunks SET tier = 'episodic', updated_at = ?1
             WHERE tier = 'short_term' AND updated_at < ?2",
            params![now.timestamp_millis(), cutoff.timestamp_millis()],
        )?;
        Ok(changed as i64)
    }

    /// Delete every chunk of one tier with a given source; returns the
    /// count removed (working-memory teardown at conversation end)
    pub fn delete_by_tier_and_source(&self, tier: Tier, source: &str) -> Result<i64> {
        let doomed: Vec<String> = {
            let reader = self.lock_reader()?;
            let mut stmt =
                reader.prepare("SELECT id FROM chunks WHERE tier = ?1 AND source = ?2")?;
            let ids = stmt
                .query_map(params![tier.as_str(), source], |row| row.get(0))?
                .filter_map(std::result::Result::ok)
                .collect();
            ids
        };

        if doomed.is_empty() {
            return Ok(0);
        }

        {
            let mut writer = self.lock_writer()?;
            let tx = writer.transaction()?;
            for id in &doomed {
                tx.execute("DELETE FROM chunks WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        {
            let mut guard = self.lock_index()?;
            if let Some(index) = guard.as_mut() {
                for id in &doomed {
                    let _ = index.remove(id);
                }
            }
        }

        Ok(doomed.len() as i64)
    }

    /// Reclaim storage
    pub fn vacuum(&self) -> Result<()> {
        let writer = self.lock_writer()?;
        writer.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// Verify index synchronization
    ///
    /// Both indexes must reference exactly the base rows: an orphaned
    /// vector row or an FTS row-count mismatch signals corruption.
    pub fn verify_integrity(&self) -> Result<()> {
        let reader = self.lock_reader()?;

        let orphan_vectors: i64 = reader.query_row(
            "SELECT COUNT(*) FROM chunk_embeddings e
             LEFT JOIN chunks c ON e.chunk_id = c.id
             WHERE c.id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if orphan_vectors > 0 {
            return Err(StoreError::Integrity(format!(
                "{} vector rows reference missing chunks",
                orphan_vectors
            )));
        }

        let chunk_count: i64 =
            reader.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let fts_count: i64 =
            reader.query_row("SELECT COUNT(*) FROM chunk_fts", [], |row| row.get(0))?;
        if chunk_count != fts_count {
            return Err(StoreError::Integrity(format!(
                "Inverted index holds {} rows for {} chunks",
                fts_count, chunk_count
            )));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Tag embeddings
    // ------------------------------------------------------------------

    /// Upsert a tag embedding; last write wins on the vector blob
    pub fn upsert_tag_embedding(
        &self,
        value: &str,
        dimension: TagDimension,
        vector: &[f32],
    ) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StoreError::InvalidArgument("Empty tag value".to_string()));
        }
        self.validate_embedding(vector)?;

        let blob = Embedding::new(vector.to_vec()).to_bytes();
        let writer = self.lock_writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO tag_embeddings
                (value, dimension, embedding, dimensions, model, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                value,
                dimension.as_str(),
                blob,
                self.dimensions as i64,
                Option::<String>::None,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Fetch one tag embedding
    pub fn tag_embedding(
        &self,
        value: &str,
        dimension: TagDimension,
    ) -> Result<Option<Vec<f32>>> {
        let reader = self.lock_reader()?;
        let bytes: Option<Vec<u8>> = reader
            .query_row(
                "SELECT embedding FROM tag_embeddings WHERE value = ?1 AND dimension = ?2",
                params![value.trim(), dimension.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(bytes.and_then(|b| Embedding::from_bytes(&b).map(|e| e.vector)))
    }

    /// All tag embeddings, optionally filtered to one dimension
    ///
    /// The tag vocabulary is bounded, so callers linear-scan this list.
    pub fn all_tag_embeddings(
        &self,
        dimension: Option<TagDimension>,
    ) -> Result<Vec<(String, TagDimension, Vec<f32>)>> {
        let reader = self.lock_reader()?;

        let raw: Vec<(String, String, Vec<u8>)> = match dimension {
            Some(d) => {
                let mut stmt = reader.prepare(
                    "SELECT value, dimension, embedding FROM tag_embeddings
                     WHERE dimension = ?1 ORDER BY value",
                )?;
                let rows = stmt
                    .query_map(params![d.as_str()], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .filter_map(std::result::Result::ok)
                    .collect();
                rows
            }
            None => {
                let mut stmt = reader.prepare(
                    "SELECT value, dimension, embedding FROM tag_embeddings
                     ORDER BY dimension, value",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .filter_map(std::result::Result::ok)
                    .collect();
                rows
            }
        };

        Ok(raw
            .into_iter()
            .filter_map(|(value, dim, bytes)| {
                let dimension = TagDimension::parse_name(&dim)?;
                let embedding = Embedding::from_bytes(&bytes)?;
                Some((value, dimension, embedding.vector))
            })
            .collect())
    }

    /// Direct writer access for test fixtures (backdating timestamps,
    /// planting legacy encodings)
    #[cfg(test)]
    pub(crate) fn raw_writer_for_tests(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.writer.lock().expect("writer lock")
    }

    // ------------------------------------------------------------------
    // Row mapping
    // ------------------------------------------------------------------

    fn column_to_datetime(ms: i64, field: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(ms).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Integer,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid {} timestamp: {}", field, ms),
                )),
            )
        })
    }

    fn corrupt_column(field: &str, value: &str) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid {} value: {}", field, value),
            )),
        )
    }

    /// Convert a row to a Chunk
    fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
        let tier_raw: String = row.get("tier")?;
        let tier =
            Tier::parse_name(&tier_raw).ok_or_else(|| Self::corrupt_column("tier", &tier_raw))?;

        let horizon_raw: Option<String> = row.get("horizon_category")?;
        let horizon_category = match horizon_raw {
            Some(raw) => Some(
                HorizonCategory::parse_name(&raw)
                    .ok_or_else(|| Self::corrupt_column("horizon_category", &raw))?,
            ),
            None => None,
        };

        let tags_json: String = row.get("tags")?;
        let metadata_json: String = row.get("metadata")?;
        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        let created_at: i64 = row.get("created_at")?;
        let updated_at: i64 = row.get("updated_at")?;
        let promoted_at: Option<i64> = row.get("promoted_at")?;
        let expires_at: Option<i64> = row.get("expires_at")?;
        let relevance_horizon: Option<i64> = row.get("relevance_horizon")?;

        Ok(Chunk {
            id: row.get("id")?,
            tier,
            content: row.get("content")?,
            summary: row.get("summary")?,
            source: row.get("source")?,
            category: row.get("category")?,
            person: row.get("person")?,
            tags: StructuredTags::from_json(&tags_json),
            confidence: row.get("confidence")?,
            created_at: Self::column_to_datetime(created_at, "created_at")?,
            updated_at: Self::column_to_datetime(updated_at, "updated_at")?,
            promoted_at: promoted_at.and_then(DateTime::from_timestamp_millis),
            expires_at: expires_at.and_then(DateTime::from_timestamp_millis),
            metadata,
            relevance_horizon: relevance_horizon.and_then(DateTime::from_timestamp_millis),
            horizon_reasoning: row.get("horizon_reasoning")?,
            horizon_confidence: row.get("horizon_confidence")?,
            horizon_category,
            has_embedding: row.get::<_, i64>("has_embedding")? != 0,
            embedding_model: row.get("embedding_model")?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
