//! Structured Tags - Multi-dimensional chunk labeling
//!
//! Tags are a fixed record of five named sets: concepts, specialized,
//! people, places, projects. Values are trimmed and deduplicated within
//! each dimension on insert; order is presentation order only.
//!
//! Legacy databases stored tags as a flat JSON array. On read those values
//! all route to `concepts`; the five-set record is the only encoding ever
//! written back.

use serde::{Deserialize, Serialize};

// ============================================================================
// TAG DIMENSIONS
// ============================================================================

/// The five tag dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagDimension {
    /// General domain concepts (infrastructure, databases, ...)
    Concepts,
    /// Technical/specialized terms (model names, identifiers, acronyms)
    Specialized,
    /// People mentioned or involved
    People,
    /// Physical or named locations
    Places,
    /// Project names
    Projects,
}

impl TagDimension {
    /// All dimensions, in canonical presentation order
    pub const ALL: [TagDimension; 5] = [
        TagDimension::Concepts,
        TagDimension::Specialized,
        TagDimension::People,
        TagDimension::Places,
        TagDimension::Projects,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TagDimension::Concepts => "concepts",
            TagDimension::Specialized => "specialized",
            TagDimension::People => "people",
            TagDimension::Places => "places",
            TagDimension::Projects => "projects",
        }
    }

    /// Parse from a string name
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "concepts" => Some(TagDimension::Concepts),
            "specialized" => Some(TagDimension::Specialized),
            "people" => Some(TagDimension::People),
            "places" => Some(TagDimension::Places),
            "projects" => Some(TagDimension::Projects),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// STRUCTURED TAGS
// ============================================================================

/// Multi-dimensional tag record attached to a chunk
///
/// Each dimension is an ordered, deduplicated set of trimmed strings.
/// A missing dimension is treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredTags {
    pub concepts: Vec<String>,
    pub specialized: Vec<String>,
    pub people: Vec<String>,
    pub places: Vec<String>,
    pub projects: Vec<String>,
}

impl StructuredTags {
    /// Create an empty tag record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-dimension iterators, trimming and deduplicating
    pub fn from_values<I, S>(dimension: TagDimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags = Self::new();
        for v in values {
            tags.insert(dimension, v.into());
        }
        tags
    }

    /// Insert a value into a dimension, trimming whitespace and skipping
    /// duplicates and empty strings
    pub fn insert(&mut self, dimension: TagDimension, value: impl Into<String>) -> bool {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        let set = self.dimension_mut(dimension);
        if set.iter().any(|v| v == trimmed) {
            return false;
        }
        set.push(trimmed.to_string());
        true
    }

    /// Borrow a dimension's values
    pub fn dimension(&self, dimension: TagDimension) -> &[String] {
        match dimension {
            TagDimension::Concepts => &self.concepts,
            TagDimension::Specialized => &self.specialized,
            TagDimension::People => &self.people,
            TagDimension::Places => &self.places,
            TagDimension::Projects => &self.projects,
        }
    }

    fn dimension_mut(&mut self, dimension: TagDimension) -> &mut Vec<String> {
        match dimension {
            TagDimension::Concepts => &mut self.concepts,
            TagDimension::Specialized => &mut self.specialized,
            TagDimension::People => &mut self.people,
            TagDimension::Places => &mut self.places,
            TagDimension::Projects => &mut self.projects,
        }
    }

    /// True when every dimension is empty
    pub fn is_empty(&self) -> bool {
        TagDimension::ALL.iter().all(|d| self.dimension(*d).is_empty())
    }

    /// Total value count across all dimensions
    pub fn len(&self) -> usize {
        TagDimension::ALL.iter().map(|d| self.dimension(*d).len()).sum()
    }

    /// Deduplicated union of all dimensions, for the inverted index
    ///
    /// Keyword search finds tag values because the flattened union is part
    /// of every chunk's indexed text.
    pub fn flatten(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut flat = Vec::with_capacity(self.len());
        for dimension in TagDimension::ALL {
            for value in self.dimension(dimension) {
                if seen.insert(value.to_lowercase()) {
                    flat.push(value.clone());
                }
            }
        }
        flat
    }

    /// True when `value` is present in `dimension` (case-insensitive)
    pub fn contains(&self, dimension: TagDimension, value: &str) -> bool {
        let needle = value.trim().to_lowercase();
        self.dimension(dimension)
            .iter()
            .any(|v| v.to_lowercase() == needle)
    }

    /// True when `value` is present in any dimension (case-insensitive)
    pub fn contains_any_dimension(&self, value: &str) -> bool {
        TagDimension::ALL.iter().any(|d| self.contains(*d, value))
    }

    /// True when every value of every specified dimension in `required` is
    /// present in `self` (the all-of structured-tag filter)
    pub fn satisfies(&self, required: &StructuredTags) -> bool {
        TagDimension::ALL.iter().all(|d| {
            required
                .dimension(*d)
                .iter()
                .all(|value| self.contains(*d, value))
        })
    }

    /// Normalize in place: trim and deduplicate every dimension
    pub fn normalize(&mut self) {
        for dimension in TagDimension::ALL {
            let values = std::mem::take(self.dimension_mut(dimension));
            for value in values {
                self.insert(dimension, value);
            }
        }
    }

    /// Decode from the persisted JSON encoding
    ///
    /// A legacy flat array (`["a", "b"]`) routes all values to `concepts`.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(values)) => Self::from_legacy(
                values
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string)),
            ),
            Ok(value) => {
                let mut tags: StructuredTags =
                    serde_json::from_value(value).unwrap_or_default();
                tags.normalize();
                tags
            }
            Err(_) => Self::default(),
        }
    }

    /// Adapt the legacy flat-array encoding: every value becomes a concept
    pub fn from_legacy<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_values(TagDimension::Concepts, values)
    }

    /// Encode to the canonical five-set JSON form
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
