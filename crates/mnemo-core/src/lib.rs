//! # Mnemo Core
//!
//! Persistent, tiered, semantic memory engine for long-running
//! conversational agents:
//!
//! - **Tiered chunk store**: embedded SQLite with synchronized FTS5 and
//!   vector indexes under one transactional model
//! - **Hybrid retrieval**: weighted fusion of BM25 keyword and HNSW
//!   vector rankings, with structured-tag boosting
//! - **Compartmentalization**: per-subject access control enforced inside
//!   every search primitive, not just at the surface
//! - **Context assembly**: per-turn query signals packed into strict
//!   per-tier token budgets
//! - **Lifecycle**: `working → short_term → long_term` promotion,
//!   episodic demotion, expiry, and vacuum
//! - **Progress core**: persistent event log plus filtered pub/sub stream
//!   for sub-agent orchestration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mnemo_core::{Memory, RememberOptions, RecallOptions, QuerySignals};
//!
//! # fn main() -> mnemo_core::Result<()> {
//! let memory = Memory::open("mnemo.db")?;
//!
//! // Store a fact
//! let id = memory.remember(
//!     "The staging cluster lives on host carbon",
//!     RememberOptions::default(),
//! )?;
//!
//! // Retrieve it
//! let found = memory.recall("where is staging?", RecallOptions::default())?;
//!
//! // Assemble a context block for the next turn
//! let context = memory.assemble_context(&QuerySignals::from_message("staging status?"))?;
//! println!("{}", context.full_text);
//! # let _ = (id, found);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//! - `vector-search` (default): HNSW vector search with USearch
//! - `bundled-sqlite` (default): bundled SQLite, no system dependency
//! - `full`: embeddings + vector-search

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod context;
pub mod engine;
pub mod ingest;
pub mod maintenance;
pub mod memory;
pub mod progress;
pub mod search;
pub mod storage;

/// Importer with an idempotency manifest
pub mod import;

/// JSON-lines backup and restore
pub mod export;

/// Relevance-horizon estimation
pub mod horizon;

/// Tag extraction and semantic tag matching
pub mod tags;

/// Embedding provider contract and the optional local service
pub mod embeddings;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Chunk model
pub use memory::{
    Chunk, ChunkFilter, ChunkInput, ChunkPatch, HorizonCategory, ListOptions, MatchType,
    MemoryStats, OrderBy, RecallOptions, ScoredChunk, SearchMode, SearchResult, SortOrder,
    StructuredTags, TagDimension, Tier,
};

// Storage layer
pub use storage::{ChunkStore, Result, StoreError};

// Search
pub use search::HybridConfig;

#[cfg(feature = "vector-search")]
pub use search::{VectorIndex, VectorIndexConfig, VectorIndexError, VectorIndexStats};

// Tag system
pub use tags::{TagExtractor, TagMatch, TagMatchType};

// Context assembly
pub use context::{
    AssembledContext, BudgetPartition, ContextInjector, ContextSection, InjectorConfig,
    QuerySignals, TierLimits,
};

// Maintenance
pub use maintenance::{
    Maintenance, MaintenanceConfig, MaintenanceScheduler, MaintenanceSummary, VacuumReport,
};

// Facade
pub use engine::{Memory, MemoryOptions, RememberOptions, SystemReport};

// Ingest hooks
pub use ingest::{ExtractedFact, Message, SessionHooks};

// Importer
pub use import::{ImportReport, Importer};

// Backup
pub use export::RestoreReport;

// Horizon estimation
pub use horizon::{HorizonEstimator, HorizonPrediction};

// Progress core
pub use progress::{
    Delivery, ProgressAggregate, ProgressEvent, ProgressEventType, ProgressMetadata,
    ProgressMetrics, ProgressQuery, ProgressStore, ProgressStream, ProgressTracker,
    StreamFilter, Subscription,
};

// Embeddings
pub use embeddings::{
    cosine_similarity, Embedding, EmbeddingError, EmbeddingProvider, EMBEDDING_DIMENSIONS,
};

#[cfg(feature = "embeddings")]
pub use embeddings::LocalEmbeddingService;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model (all-MiniLM-L6-v2, 384 dimensions)
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AssembledContext, Chunk, ChunkFilter, ChunkInput, ChunkStore, ContextInjector, Memory,
        MemoryOptions, MemoryStats, QuerySignals, RecallOptions, RememberOptions, Result,
        SearchMode, StoreError, StructuredTags, TagDimension, Tier,
    };

    pub use crate::{Maintenance, MaintenanceConfig};

    pub use crate::{ProgressEvent, ProgressStore, ProgressStream, ProgressTracker, StreamFilter};

    pub use crate::EmbeddingProvider;

    #[cfg(feature = "embeddings")]
    pub use crate::LocalEmbeddingService;
}
