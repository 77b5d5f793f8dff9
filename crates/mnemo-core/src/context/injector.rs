//! Context Injector
//!
//! Assembles a ranked, budget-bounded context block for one
//! conversational turn: per-turn query signals drive tiered retrieval,
//! the compartmentalization filter scopes every query, and the highest
//! scoring chunks pack into per-tier token budgets.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::embeddings::EmbeddingProvider;
use crate::memory::{ChunkFilter, ListOptions, OrderBy, ScoredChunk, SortOrder, Tier};
use crate::search::HybridConfig;
use crate::storage::{ChunkStore, Result};

use super::format::{estimate_tokens, format_chunk_line, tier_header};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default total token budget
pub const DEFAULT_TOKEN_BUDGET: usize = 4000;

/// Base relevance score assigned to subject-fetched chunks
const PERSON_CHUNK_BASE_SCORE: f32 = 0.8;

/// Multiplier applied when merging subject chunks into the long-term list
const PERSON_CHUNK_MULTIPLIER: f32 = 1.2;

/// Subject fetch cap (per subject)
const PERSON_CHUNK_FETCH: i64 = 10;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Fraction of the total budget owned by each tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPartition {
    pub working: f64,
    pub short_term: f64,
    pub long_term: f64,
    pub system: f64,
}

impl Default for BudgetPartition {
    fn default() -> Self {
        Self {
            working: 0.60,
            short_term: 0.15,
            long_term: 0.20,
            system: 0.05,
        }
    }
}

impl BudgetPartition {
    /// Fraction for a tier (episodic has no partition of its own)
    pub fn fraction(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Working => self.working,
            Tier::ShortTerm => self.short_term,
            Tier::LongTerm => self.long_term,
            Tier::Episodic => 0.0,
        }
    }
}

/// Per-tier chunk-count caps, binding in addition to token budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub working: usize,
    pub short_term: usize,
    pub long_term: usize,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            working: 20,
            short_term: 5,
            long_term: 10,
        }
    }
}

impl TierLimits {
    /// Cap for a tier
    pub fn cap(&self, tier: Tier) -> usize {
        match tier {
            Tier::Working => self.working,
            Tier::ShortTerm => self.short_term,
            Tier::LongTerm => self.long_term,
            Tier::Episodic => 0,
        }
    }
}

/// Injector configuration; read-only after construction
#[derive(Debug, Clone, Default)]
pub struct InjectorConfig {
    /// Total token budget when signals carry no override
    pub budget_tokens: Option<usize>,
    /// Budget split across tiers
    pub partition: BudgetPartition,
    /// Per-tier chunk caps
    pub limits: TierLimits,
    /// Hybrid search tuning
    pub hybrid: HybridConfig,
}

// ============================================================================
// SIGNALS & OUTPUT
// ============================================================================

/// Per-turn input to the injector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySignals {
    /// The user's raw turn text (required)
    pub current_message: String,
    /// Compartmentalization subject for this turn
    pub current_person: Option<String>,
    /// Subjects to bias retrieval toward
    pub people_mentioned: Vec<String>,
    /// Extra query terms
    pub topic_keywords: Vec<String>,
    /// Originating channel
    pub channel: Option<String>,
    /// Session identifier
    pub session_id: Option<String>,
    /// Override of the default token budget
    pub total_token_budget: Option<usize>,
}

impl QuerySignals {
    /// Signals with just a message
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            current_message: message.into(),
            ..Default::default()
        }
    }
}

/// One packed section of the assembled context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSection {
    /// Markdown header line
    pub header: String,
    /// Tier this section drew from
    pub tier: Tier,
    /// Bullet lines, newline-joined
    pub content: String,
    /// Estimated tokens (header + content)
    pub token_count: usize,
    /// Ids of the chunks included
    pub chunk_ids: Vec<String>,
    /// Candidates that were ranked but did not fit
    pub excluded_count: usize,
}

/// The assembled context block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledContext {
    /// Non-empty sections, in tier order
    pub sections: Vec<ContextSection>,
    /// Sections concatenated with blank lines
    pub full_text: String,
    /// Total estimated tokens across sections
    pub total_tokens: usize,
    /// The budget this assembly ran under
    pub budget_tokens: usize,
    /// `total_tokens / budget_tokens`
    pub utilization: f64,
    /// Union of all section chunk ids
    pub included_chunk_ids: Vec<String>,
    /// Wall-clock assembly time
    pub assembly_duration_ms: u64,
}

// ============================================================================
// INJECTOR
// ============================================================================

/// Context assembler; configuration is read-only after construction
#[derive(Debug, Default)]
pub struct ContextInjector {
    config: InjectorConfig,
}

impl ContextInjector {
    /// Create with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: InjectorConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Assemble a context block for one turn
    ///
    /// Embedding failure is a degradation, not an error: retrieval falls
    /// back to the inverted index alone.
    pub fn assemble(
        &self,
        store: &ChunkStore,
        provider: Option<&dyn EmbeddingProvider>,
        signals: &QuerySignals,
    ) -> Result<AssembledContext> {
        let started = Instant::now();
        let now = Utc::now();

        let budget = signals
            .total_token_budget
            .or(self.config.budget_tokens)
            .unwrap_or(DEFAULT_TOKEN_BUDGET);

        let query_text = self.query_text(signals);
        let query_embedding = self.query_embedding(provider, &query_text);

        // Tiered retrieval, person-scoped at the primitive level
        let working = self.working_candidates(store, signals)?;
        let short_term = self.searched_candidates(
            store,
            signals,
            &query_text,
            query_embedding.as_deref(),
            Tier::ShortTerm,
        )?;
        let mut long_term = self.searched_candidates(
            store,
            signals,
            &query_text,
            query_embedding.as_deref(),
            Tier::LongTerm,
        )?;
        self.merge_person_chunks(store, signals, &mut long_term)?;

        // Pack each tier into its slice of the budget
        let mut sections = Vec::new();
        for (tier, candidates) in [
            (Tier::Working, working),
            (Tier::ShortTerm, short_term),
            (Tier::LongTerm, long_term),
        ] {
            if let Some(section) = self.pack_section(tier, candidates, budget, now) {
                sections.push(section);
            }
        }

        let full_text = sections
            .iter()
            .map(|s| format!("{}\n{}", s.header, s.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let total_tokens: usize = sections.iter().map(|s| s.token_count).sum();
        let mut included_chunk_ids: Vec<String> = Vec::new();
        for section in &sections {
            for id in &section.chunk_ids {
                if !included_chunk_ids.contains(id) {
                    included_chunk_ids.push(id.clone());
                }
            }
        }

        Ok(AssembledContext {
            sections,
            full_text,
            total_tokens,
            budget_tokens: budget,
            utilization: if budget > 0 {
                total_tokens as f64 / budget as f64
            } else {
                0.0
            },
            included_chunk_ids,
            assembly_duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn query_text(&self, signals: &QuerySignals) -> String {
        if signals.topic_keywords.is_empty() {
            signals.current_message.clone()
        } else {
            format!(
                "{} {}",
                signals.current_message,
                signals.topic_keywords.join(" ")
            )
        }
    }

    fn query_embedding(
        &self,
        provider: Option<&dyn EmbeddingProvider>,
        query_text: &str,
    ) -> Option<Vec<f32>> {
        let provider = provider?;
        if !provider.is_available() || query_text.is_empty() {
            return None;
        }
        match provider.embed(query_text) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Query embedding failed, degrading to text search: {}", e);
                None
            }
        }
    }

    /// Working tier: a recency-ordered scratchpad, not a search corpus
    fn working_candidates(
        &self,
        store: &ChunkStore,
        signals: &QuerySignals,
    ) -> Result<Vec<ScoredChunk>> {
        let filter = ChunkFilter {
            person: signals.current_person.clone(),
            ..Default::default()
        };
        let options = ListOptions {
            limit: self.config.limits.working as i64,
            offset: 0,
            order_by: OrderBy::UpdatedAt,
            order: SortOrder::Desc,
        };

        Ok(store
            .get_by_tier(Tier::Working, &options)?
            .into_iter()
            .filter(|chunk| filter.matches(chunk))
            .map(|chunk| ScoredChunk { chunk, score: 1.0 })
            .collect())
    }

    fn searched_candidates(
        &self,
        store: &ChunkStore,
        signals: &QuerySignals,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        tier: Tier,
    ) -> Result<Vec<ScoredChunk>> {
        let filter = ChunkFilter {
            tier: Some(tier),
            person: signals.current_person.clone(),
            ..Default::default()
        };

        let results = store.search_hybrid(
            query_text,
            query_embedding,
            self.config.limits.cap(tier) as i64,
            &filter,
            &self.config.hybrid,
        )?;

        Ok(results
            .into_iter()
            .map(|r| ScoredChunk {
                chunk: r.chunk,
                score: r.combined_score,
            })
            .collect())
    }

    /// Fetch subject-scoped chunks and merge-boost them into the long-term
    /// candidate list
    ///
    /// Subjects other than the current person stay walled off: with a
    /// current person set, only that subject's chunks are fetched.
    fn merge_person_chunks(
        &self,
        store: &ChunkStore,
        signals: &QuerySignals,
        long_term: &mut Vec<ScoredChunk>,
    ) -> Result<()> {
        let subjects: Vec<String> = match &signals.current_person {
            Some(person) => vec![person.clone()],
            None => {
                let mut seen = std::collections::HashSet::new();
                signals
                    .people_mentioned
                    .iter()
                    .filter(|p| seen.insert(p.to_lowercase()))
                    .cloned()
                    .collect()
            }
        };

        if subjects.is_empty() {
            return Ok(());
        }

        let filter = ChunkFilter {
            person: signals.current_person.clone(),
            ..Default::default()
        };

        let boosted_score =
            (PERSON_CHUNK_BASE_SCORE * PERSON_CHUNK_MULTIPLIER).min(1.0);

        for subject in subjects {
            let options = ListOptions {
                limit: PERSON_CHUNK_FETCH,
                ..Default::default()
            };
            for chunk in store.get_by_person(&subject, &options)? {
                if !filter.matches(&chunk) {
                    continue;
                }
                if long_term.iter().any(|c| c.chunk.id == chunk.id) {
                    continue;
                }
                long_term.push(ScoredChunk {
                    chunk,
                    score: boosted_score,
                });
            }
        }

        long_term.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });

        Ok(())
    }

    /// Pack ranked candidates into a tier section; token budget and chunk
    /// cap both bind, whichever is hit first
    fn pack_section(
        &self,
        tier: Tier,
        candidates: Vec<ScoredChunk>,
        total_budget: usize,
        now: chrono::DateTime<Utc>,
    ) -> Option<ContextSection> {
        if candidates.is_empty() {
            return None;
        }

        let header = tier_header(tier).to_string();
        let tier_budget =
            (total_budget as f64 * self.config.partition.fraction(tier)).floor() as usize;
        let cap = self.config.limits.cap(tier);

        let mut used = estimate_tokens(&header);
        let mut lines = Vec::new();
        let mut chunk_ids = Vec::new();
        let mut excluded = 0usize;

        for candidate in &candidates {
            if chunk_ids.len() >= cap {
                excluded += 1;
                continue;
            }
            let line = format_chunk_line(&candidate.chunk, now);
            let line_tokens = estimate_tokens(&line) + 1;
            if used + line_tokens > tier_budget {
                excluded += 1;
                continue;
            }
            used += line_tokens;
            lines.push(line);
            chunk_ids.push(candidate.chunk.id.clone());
        }

        if lines.is_empty() {
            return None;
        }

        Some(ContextSection {
            header,
            tier,
            content: lines.join("\n"),
            token_count: used,
            chunk_ids,
            excluded_count: excluded,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
