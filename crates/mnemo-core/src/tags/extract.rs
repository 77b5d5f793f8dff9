//! Tag Extraction
//!
//! Deterministic pattern-based classifier: fixed lexicons plus casing
//! rules produce a structured tag set from raw text and an optional
//! context path (heading trail). Same input, same output - the extractor
//! holds no state and consults no clock.

use crate::memory::{StructuredTags, TagDimension};

// ============================================================================
// LEXICONS
// ============================================================================

/// Domain concepts, matched case-insensitively on word boundaries.
/// Canonical form is the lexicon entry (lowercase).
const CONCEPT_LEXICON: &[&str] = &[
    "backup",
    "budget",
    "calendar",
    "coffee",
    "config",
    "database",
    "deployment",
    "email",
    "embedding",
    "gpu",
    "health",
    "inference",
    "infrastructure",
    "meeting",
    "memory",
    "migration",
    "model",
    "monitoring",
    "music",
    "network",
    "salary",
    "security",
    "server",
    "sleep",
    "testing",
    "training",
    "travel",
];

/// Generic place nouns (lowercase canonical form)
const PLACE_NOUNS: &[&str] = &[
    "airport", "cafe", "gym", "home", "hospital", "hotel", "office", "school",
];

/// Proper place names (canonical casing preserved)
const PLACE_NAMES: &[&str] = &[
    "Amsterdam",
    "Athens",
    "Berlin",
    "London",
    "Paris",
    "Thessaloniki",
    "Tokyo",
];

/// Kinship and nickname synonyms, normalized to a canonical person name
const PERSON_SYNONYMS: &[(&str, &str)] = &[
    ("dad", "Dad"),
    ("father", "Dad"),
    ("mom", "Mom"),
    ("mother", "Mom"),
    ("grandma", "Grandma"),
    ("grandmother", "Grandma"),
    ("grandpa", "Grandpa"),
    ("grandfather", "Grandpa"),
];

/// Honorifics: the following capitalized token is a person
const HONORIFICS: &[&str] = &["dr", "mr", "mrs", "ms", "prof"];

/// Project markers: a capitalized token adjacent to one of these is a
/// project name ("project Hephie", "Hephie project")
const PROJECT_MARKERS: &[&str] = &["project", "repo", "codebase"];

// ============================================================================
// CASING RULES
// ============================================================================

/// 2-6 chars, all uppercase alphanumeric, at least two letters (RTX, GPU, SSD)
fn is_acronym(token: &str) -> bool {
    let len = token.chars().count();
    if !(2..=6).contains(&len) {
        return false;
    }
    let letters = token.chars().filter(|c| c.is_ascii_uppercase()).count();
    letters >= 2
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Internal capitalization after a lowercase run (PyTorch, OpenClaw)
fn is_camel_case(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    let mut seen_lower = false;
    for c in chars {
        if c.is_lowercase() {
            seen_lower = true;
        } else if c.is_uppercase() && seen_lower {
            return true;
        }
    }
    false
}

fn is_capitalized_word(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_uppercase()) && chars.all(|c| c.is_lowercase())
}

fn is_all_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Stateless tag extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct TagExtractor;

impl TagExtractor {
    /// Create an extractor
    pub fn new() -> Self {
        Self
    }

    /// Extract a structured tag set from text
    pub fn extract(&self, text: &str) -> StructuredTags {
        self.extract_with_context(text, &[])
    }

    /// Extract with a context path (heading trail); capitalized path
    /// segments become project candidates
    pub fn extract_with_context(&self, text: &str, context_path: &[&str]) -> StructuredTags {
        let mut tags = StructuredTags::new();
        let tokens = tokenize_words(text);

        for (i, token) in tokens.iter().enumerate() {
            let lower = token.to_lowercase();

            // Concepts: lexicon hit, canonical lowercase form
            if CONCEPT_LEXICON.binary_search(&lower.as_str()).is_ok() {
                tags.insert(TagDimension::Concepts, lower.clone());
            }

            // People: synonym table, then honorific rule
            if let Some((_, canonical)) =
                PERSON_SYNONYMS.iter().find(|(from, _)| *from == lower)
            {
                tags.insert(TagDimension::People, *canonical);
            }
            if HONORIFICS.contains(&lower.as_str()) {
                if let Some(next) = tokens.get(i + 1) {
                    if is_capitalized_word(next) {
                        tags.insert(TagDimension::People, next.as_str());
                    }
                }
            }

            // Places: proper names with canonical casing, generic nouns lowercased
            if let Some(canonical) = PLACE_NAMES
                .iter()
                .find(|name| name.eq_ignore_ascii_case(token))
            {
                tags.insert(TagDimension::Places, *canonical);
            }
            if PLACE_NOUNS.contains(&lower.as_str()) {
                tags.insert(TagDimension::Places, lower.clone());
            }

            // Specialized: acronyms (joined with a trailing model number),
            // CamelCase identifiers, underscore identifiers
            if is_acronym(token) {
                let term = match tokens.get(i + 1) {
                    Some(next) if is_all_digits(next) => format!("{} {}", token, next),
                    _ => token.clone(),
                };
                tags.insert(TagDimension::Specialized, term);
            } else if is_camel_case(token) || token.contains('_') {
                tags.insert(TagDimension::Specialized, token.as_str());
            }

            // Projects: marker adjacency rule
            if PROJECT_MARKERS.contains(&lower.as_str()) {
                if let Some(next) = tokens.get(i + 1) {
                    if is_capitalized_word(next) || is_camel_case(next) {
                        tags.insert(TagDimension::Projects, next.as_str());
                    }
                }
                if i > 0 {
                    let prev = &tokens[i - 1];
                    if is_capitalized_word(prev) || is_camel_case(prev) {
                        tags.insert(TagDimension::Projects, prev.as_str());
                    }
                }
            }
        }

        // Context path headings: capitalized segments are project candidates
        for segment in context_path {
            let segment = segment.trim();
            if is_capitalized_word(segment) || is_camel_case(segment) {
                tags.insert(TagDimension::Projects, segment);
            }
        }

        tags
    }
}

/// Split into word tokens, keeping case and underscores
fn tokenize_words(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ============================================================================
// TESTS
// ============================================================================
