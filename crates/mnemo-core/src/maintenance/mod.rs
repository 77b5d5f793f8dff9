//! Lifecycle Maintenance
//!
//! Three independently runnable cycles over the chunk store:
//!
//! 1. **Decay**: hard-delete expired chunks, then demote short-term
//!    chunks that sat inactive past the retention window to episodic.
//! 2. **Promotion**: raise short-term chunks to long-term when any
//!    promotion trigger fires (confidence, access count, importance flag,
//!    important tags).
//! 3. **Vacuum**: reclaim storage and report what the pass removed.
//!
//! Long-term and working chunks never decay. Cycles are not interruptible
//! mid-cycle; each runs to completion and reports a count.

mod scheduler;

pub use scheduler::{MaintenanceScheduler, DEFAULT_MAINTENANCE_INTERVAL};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::memory::{ListOptions, Tier};
use crate::storage::{ChunkStore, Result};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Default retention window for short-term chunks
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Default confidence threshold for promotion
pub const DEFAULT_PROMOTION_CONFIDENCE: f64 = 0.8;

/// Default access-count threshold for promotion
pub const DEFAULT_PROMOTION_MIN_ACCESS: i64 = 3;

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Inactivity window after which short-term chunks demote to episodic
    pub retention: Duration,
    /// Promote when `confidence >=` this
    pub promotion_confidence_threshold: f64,
    /// Promote when `metadata.accessCount >=` this
    pub promotion_min_access_count: i64,
    /// Promote when any of these appears as a flat tag
    pub important_tags: Vec<String>,
    /// Page size for the promotion scan
    pub scan_page_size: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
            promotion_confidence_threshold: DEFAULT_PROMOTION_CONFIDENCE,
            promotion_min_access_count: DEFAULT_PROMOTION_MIN_ACCESS,
            important_tags: vec!["important".to_string(), "remember".to_string()],
            scan_page_size: 500,
        }
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Structured outcome of a vacuum pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VacuumReport {
    /// Deletions performed earlier in the pass this vacuum closed out
    pub affected: i64,
    /// Wall-clock time of the vacuum itself
    pub duration_ms: i64,
    /// Human-readable notes
    pub details: Vec<String>,
    /// Errors encountered (vacuum is best-effort)
    pub errors: Vec<String>,
}

/// Composite outcome of `run_all`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSummary {
    /// Chunks hard-deleted for expiry
    pub expired_deleted: i64,
    /// Short-term chunks demoted to episodic
    pub demoted: i64,
    /// Short-term chunks promoted to long-term
    pub promoted: i64,
    /// Vacuum outcome
    pub vacuum: VacuumReport,
    /// Total wall-clock time
    pub duration_ms: i64,
}

// ============================================================================
// MAINTENANCE
// ============================================================================

/// Maintenance cycle runner
#[derive(Debug, Default)]
pub struct Maintenance {
    config: MaintenanceConfig,
}

impl Maintenance {
    /// Create with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: MaintenanceConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Decay cycle: expiry hard-deletes plus short-term → episodic
    /// demotion. Returns the number of chunks affected.
    pub fn run_decay_cycle(&self, store: &ChunkStore) -> Result<i64> {
        let now = Utc::now();

        let deleted = store.delete_expired(now)?;
        if deleted > 0 {
            tracing::info!("Decay: hard-deleted {} expired chunks", deleted);
        }

        let cutoff = now - self.config.retention;
        let demoted = store.demote_stale_short_term(cutoff, now)?;
        if demoted > 0 {
            tracing::info!("Decay: demoted {} stale short-term chunks to episodic", demoted);
        }

        Ok(deleted + demoted)
    }

    /// Promotion cycle: raise qualifying short-term chunks to long-term.
    /// Returns the number promoted.
    ///
    /// A chunk qualifies when **any** trigger fires:
    /// - confidence at or above the threshold
    /// - `metadata.accessCount` at or above the minimum
    /// - `metadata.important === true`
    /// - any configured important tag present as a flat tag
    pub fn run_promotion_cycle(&self, store: &ChunkStore) -> Result<i64> {
        // Collect ids first: promoting mid-scan would shift pagination
        let mut candidates = Vec::new();
        let mut offset = 0i64;
        loop {
            let page = store.get_by_tier(
                Tier::ShortTerm,
                &ListOptions {
                    limit: self.config.scan_page_size,
                    offset,
                    ..Default::default()
                },
            )?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as i64;

            for chunk in page {
                let by_confidence =
                    chunk.confidence >= self.config.promotion_confidence_threshold;
                let by_access =
                    chunk.access_count() >= self.config.promotion_min_access_count;
                let by_flag = chunk.is_important();
                let by_tag = self
                    .config
                    .important_tags
                    .iter()
                    .any(|tag| chunk.tags.contains_any_dimension(tag));

                if by_confidence || by_access || by_flag || by_tag {
                    candidates.push(chunk.id);
                }
            }
        }

        let mut promoted = 0i64;
        for id in candidates {
            store.promote(&id, Tier::LongTerm)?;
            promoted += 1;
        }

        if promoted > 0 {
            tracing::info!("Promotion: raised {} chunks to long-term", promoted);
        }
        Ok(promoted)
    }

    /// Vacuum pass; `deletions_earlier` is the count of deletions the
    /// surrounding pass performed before reclaiming storage
    pub fn run_vacuum(&self, store: &ChunkStore, deletions_earlier: i64) -> VacuumReport {
        let started = Instant::now();
        let mut report = VacuumReport {
            affected: deletions_earlier,
            ..Default::default()
        };

        match store.vacuum() {
            Ok(()) => report.details.push("vacuum completed".to_string()),
            Err(e) => {
                tracing::warn!("Vacuum failed: {}", e);
                report.errors.push(e.to_string());
            }
        }

        report.duration_ms = started.elapsed().as_millis() as i64;
        report
    }

    /// Run decay, promotion, and vacuum as one pass
    pub fn run_all(&self, store: &ChunkStore) -> Result<MaintenanceSummary> {
        let started = Instant::now();
        let now = Utc::now();

        let expired_deleted = store.delete_expired(now)?;
        let cutoff = now - self.config.retention;
        let demoted = store.demote_stale_short_term(cutoff, now)?;
        let promoted = self.run_promotion_cycle(store)?;
        let vacuum = self.run_vacuum(store, expired_deleted);

        Ok(MaintenanceSummary {
            expired_deleted,
            demoted,
            promoted,
            vacuum,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
