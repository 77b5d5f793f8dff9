//! Memory Chunk - The atomic unit of stored memory
//!
//! Each chunk carries:
//! - Content, optional summary, and provenance
//! - A lifecycle tier (working, short_term, long_term, episodic)
//! - An optional compartmentalization subject (`person`)
//! - Structured multi-dimensional tags
//! - Confidence, expiry, and relevance-horizon metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::tags::StructuredTags;

// ============================================================================
// TIERS
// ============================================================================

/// Lifecycle tier of a chunk
///
/// `working < short_term < long_term` form the promotion lattice;
/// `episodic` is the off-lattice demotion target for aged-out short-term
/// chunks and is neither a promotion source nor a promotion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Per-conversation scratchpad
    Working,
    /// Recent facts with a retention window
    #[default]
    ShortTerm,
    /// Durable knowledge
    LongTerm,
    /// Historical record of decayed short-term chunks
    Episodic,
}

impl Tier {
    /// All tiers
    pub const ALL: [Tier; 4] = [Tier::Working, Tier::ShortTerm, Tier::LongTerm, Tier::Episodic];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Working => "working",
            Tier::ShortTerm => "short_term",
            Tier::LongTerm => "long_term",
            Tier::Episodic => "episodic",
        }
    }

    /// Parse from a string name; `None` for anything off the enum
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "working" => Some(Tier::Working),
            "short_term" => Some(Tier::ShortTerm),
            "long_term" => Some(Tier::LongTerm),
            "episodic" => Some(Tier::Episodic),
            _ => None,
        }
    }

    /// Position on the promotion lattice; `None` for the off-lattice
    /// episodic tier
    pub fn lattice_rank(&self) -> Option<u8> {
        match self {
            Tier::Working => Some(0),
            Tier::ShortTerm => Some(1),
            Tier::LongTerm => Some(2),
            Tier::Episodic => None,
        }
    }

    /// True when moving from `self` to `target` is a legal promotion
    /// (strictly higher on the lattice)
    pub fn can_promote_to(&self, target: Tier) -> bool {
        match (self.lattice_rank(), target.lattice_rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse_name(s).ok_or_else(|| format!("Unknown tier: {}", s))
    }
}

// ============================================================================
// RELEVANCE HORIZON
// ============================================================================

/// Predicted-obsolescence classification, orthogonal to tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonCategory {
    /// Obsolete within hours or days
    Ephemeral,
    /// Tied to a transient situation
    Situational,
    /// Valid for the lifetime of a project
    ProjectScoped,
    /// About a relationship with a person
    Relational,
    /// About who the user or agent is
    Identity,
    /// A standing rule or policy
    Policy,
}

impl HorizonCategory {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizonCategory::Ephemeral => "ephemeral",
            HorizonCategory::Situational => "situational",
            HorizonCategory::ProjectScoped => "project_scoped",
            HorizonCategory::Relational => "relational",
            HorizonCategory::Identity => "identity",
            HorizonCategory::Policy => "policy",
        }
    }

    /// Parse from a string name; `None` for anything off the enum
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "ephemeral" => Some(HorizonCategory::Ephemeral),
            "situational" => Some(HorizonCategory::Situational),
            "project_scoped" => Some(HorizonCategory::ProjectScoped),
            "relational" => Some(HorizonCategory::Relational),
            "identity" => Some(HorizonCategory::Identity),
            "policy" => Some(HorizonCategory::Policy),
            _ => None,
        }
    }
}

impl std::fmt::Display for HorizonCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CHUNK
// ============================================================================

/// A memory chunk
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique identifier (UUID v4); stable across mutations
    pub id: String,
    /// Current lifecycle tier
    pub tier: Tier,
    /// The stored fact; may be large (≥ 10 KB)
    pub content: String,
    /// Short display form (≤ ~150 chars); generated when absent
    pub summary: Option<String>,
    /// Origin hint (session id, file path, channel)
    pub source: Option<String>,
    /// Free-form category (fact, decision, preference, lesson, event, person)
    pub category: Option<String>,
    /// Compartmentalization subject; absent = visible to all contexts
    pub person: Option<String>,
    /// Structured tags
    pub tags: StructuredTags,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time; monotonically non-decreasing
    pub updated_at: DateTime<Utc>,
    /// Set when the tier last rose
    pub promoted_at: Option<DateTime<Utc>>,
    /// Hard-delete trigger for the next maintenance pass
    pub expires_at: Option<DateTime<Utc>>,
    /// Opaque attribute bag; recognized keys: `accessCount`, `important`
    pub metadata: Map<String, Value>,
    /// Predicted obsolescence date
    pub relevance_horizon: Option<DateTime<Utc>>,
    /// Free-text reasoning behind the horizon prediction
    pub horizon_reasoning: Option<String>,
    /// Confidence in the horizon prediction
    pub horizon_confidence: Option<f64>,
    /// Horizon classification, orthogonal to tier
    pub horizon_category: Option<HorizonCategory>,
    /// Whether a vector-index row exists for this chunk
    pub has_embedding: bool,
    /// Which model generated the embedding
    pub embedding_model: Option<String>,
}

impl Chunk {
    /// Deduplicated union of all tag dimensions
    pub fn flat_tags(&self) -> Vec<String> {
        self.tags.flatten()
    }

    /// `metadata.accessCount`, defaulting to 0
    pub fn access_count(&self) -> i64 {
        self.metadata
            .get("accessCount")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// `metadata.important === true`
    pub fn is_important(&self) -> bool {
        self.metadata
            .get("important")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// True when `expires_at` has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t < now)
    }

    /// Access predicate for compartmentalization
    ///
    /// A chunk scoped to person P is accessible iff no current person is
    /// set (administrative context) or the current person is P. Unscoped
    /// chunks are always accessible. Enforced at every search primitive.
    pub fn accessible_to(&self, current_person: Option<&str>) -> bool {
        match (&self.person, current_person) {
            (Some(p), Some(q)) => p == q,
            _ => true,
        }
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a new chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChunkInput {
    /// The content to store
    pub content: String,
    /// Lifecycle tier
    #[serde(default)]
    pub tier: Tier,
    /// Short display form; generated when absent
    pub summary: Option<String>,
    /// Origin hint
    pub source: Option<String>,
    /// Free-form category
    pub category: Option<String>,
    /// Compartmentalization subject
    pub person: Option<String>,
    /// Structured tags
    #[serde(default)]
    pub tags: StructuredTags,
    /// Confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Hard-delete trigger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Opaque attribute bag
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Predicted obsolescence date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_horizon: Option<DateTime<Utc>>,
    /// Reasoning behind the horizon prediction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_reasoning: Option<String>,
    /// Confidence in the horizon prediction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_confidence: Option<f64>,
    /// Horizon classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_category: Option<HorizonCategory>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Default for ChunkInput {
    fn default() -> Self {
        Self {
            content: String::new(),
            tier: Tier::ShortTerm,
            summary: None,
            source: None,
            category: None,
            person: None,
            tags: StructuredTags::default(),
            confidence: 1.0,
            expires_at: None,
            metadata: Map::new(),
            relevance_horizon: None,
            horizon_reasoning: None,
            horizon_confidence: None,
            horizon_category: None,
        }
    }
}

impl ChunkInput {
    /// Create an input with content and all defaults
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Partial update of an existing chunk
///
/// `None` fields are left unchanged. Mutations always bump `updated_at`;
/// a tier increase additionally sets `promoted_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkPatch {
    pub content: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub person: Option<String>,
    pub tags: Option<StructuredTags>,
    pub confidence: Option<f64>,
    pub tier: Option<Tier>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<Map<String, Value>>,
    pub relevance_horizon: Option<DateTime<Utc>>,
    pub horizon_reasoning: Option<String>,
    pub horizon_confidence: Option<f64>,
    pub horizon_category: Option<HorizonCategory>,
}

impl ChunkPatch {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.summary.is_none()
            && self.source.is_none()
            && self.category.is_none()
            && self.person.is_none()
            && self.tags.is_none()
            && self.confidence.is_none()
            && self.tier.is_none()
            && self.expires_at.is_none()
            && self.metadata.is_none()
            && self.relevance_horizon.is_none()
            && self.horizon_reasoning.is_none()
            && self.horizon_confidence.is_none()
            && self.horizon_category.is_none()
    }

    /// True when the patch touches any text indexed by the inverted index
    pub fn touches_indexed_text(&self) -> bool {
        self.content.is_some() || self.summary.is_some() || self.tags.is_some()
    }
}

// ============================================================================
// LISTING
// ============================================================================

/// Sort column for tier/person scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl OrderBy {
    /// Column name in the chunks table
    pub fn column(&self) -> &'static str {
        match self {
            OrderBy::CreatedAt => "created_at",
            OrderBy::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination options for tier/person scans
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
    pub order_by: OrderBy,
    pub order: SortOrder,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            order_by: OrderBy::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Shared filter predicate for all search operations
///
/// Applied after candidate generation. Flat-tag match is any-of;
/// structured-tag match is all-of over the specified dimensions. The
/// `person` field is the current compartmentalization subject, not an
/// exact-match column filter (see [`Chunk::accessible_to`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkFilter {
    pub tier: Option<Tier>,
    pub person: Option<String>,
    pub category: Option<String>,
    pub flat_tags: Vec<String>,
    pub structured_tags: Option<StructuredTags>,
}

impl ChunkFilter {
    /// Filter scoped to a compartmentalization subject
    pub fn for_person(person: impl Into<String>) -> Self {
        Self {
            person: Some(person.into()),
            ..Default::default()
        }
    }

    /// Evaluate the predicate against a chunk
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if !chunk.accessible_to(self.person.as_deref()) {
            return false;
        }
        if let Some(tier) = self.tier {
            if chunk.tier != tier {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if chunk.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if !self.flat_tags.is_empty() {
            let any = self
                .flat_tags
                .iter()
                .any(|tag| chunk.tags.contains_any_dimension(tag));
            if !any {
                return false;
            }
        }
        if let Some(required) = &self.structured_tags {
            if !chunk.tags.satisfies(required) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
