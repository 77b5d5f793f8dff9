//! Relevance Horizon Estimation
//!
//! Predicts when a chunk will stop mattering. The estimator is a
//! deterministic pattern classifier: content cues, category, and tags map
//! to one of six horizon categories, each with a default time-to-
//! obsolescence. The prediction is advisory - maintenance never deletes
//! on a horizon, it only informs ranking and review tooling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{ChunkInput, HorizonCategory, TagDimension};

// ============================================================================
// PREDICTION
// ============================================================================

/// A horizon prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonPrediction {
    /// Predicted obsolescence date; `None` for identity/policy knowledge
    pub relevance_horizon: Option<DateTime<Utc>>,
    /// Classification driving the date
    pub category: HorizonCategory,
    /// Why the classifier chose this category
    pub reasoning: String,
    /// Confidence in the prediction
    pub confidence: f64,
}

/// Default time-to-obsolescence per category
fn category_window(category: HorizonCategory) -> Option<Duration> {
    match category {
        HorizonCategory::Ephemeral => Some(Duration::days(2)),
        HorizonCategory::Situational => Some(Duration::days(30)),
        HorizonCategory::ProjectScoped => Some(Duration::days(180)),
        HorizonCategory::Relational => Some(Duration::days(365)),
        // Who someone is and what the standing rules are do not expire
        HorizonCategory::Identity | HorizonCategory::Policy => None,
    }
}

// ============================================================================
// CUE TABLES
// ============================================================================

/// Content cues for near-term obsolescence
const EPHEMERAL_CUES: &[&str] = &[
    "today",
    "tonight",
    "tomorrow",
    "this afternoon",
    "this evening",
    "this morning",
    "right now",
    "at the moment",
];

/// Content cues for situation-bound facts
const SITUATIONAL_CUES: &[&str] = &[
    "this week",
    "this month",
    "this sprint",
    "this quarter",
    "currently",
    "for now",
    "until further notice",
    "temporarily",
];

/// Content cues for standing rules
const POLICY_CUES: &[&str] = &[
    "always",
    "never",
    "policy",
    "rule:",
    "must ",
    "required to",
    "by default",
];

/// Content cues for identity knowledge
const IDENTITY_CUES: &[&str] = &[
    "my name is",
    "their name is",
    "her name is",
    "his name is",
    "i am a",
    "i work as",
    "born in",
    "grew up in",
];

fn contains_cue(haystack: &str, cues: &[&'static str]) -> Option<&'static str> {
    cues.iter().find(|cue| haystack.contains(*cue)).copied()
}

// ============================================================================
// ESTIMATOR
// ============================================================================

/// Deterministic horizon estimator
#[derive(Debug, Default, Clone, Copy)]
pub struct HorizonEstimator;

impl HorizonEstimator {
    /// Create an estimator
    pub fn new() -> Self {
        Self
    }

    /// Predict a horizon for a chunk input
    ///
    /// Precedence: identity cues, then policy cues, then category hints,
    /// then ephemeral/situational content cues, then tag shape. The
    /// fallback is situational at low confidence.
    pub fn estimate(&self, input: &ChunkInput, now: DateTime<Utc>) -> HorizonPrediction {
        let content = input.content.to_lowercase();
        let category = input.category.as_deref();

        if let Some(cue) = contains_cue(&content, IDENTITY_CUES) {
            return self.prediction(
                HorizonCategory::Identity,
                format!("identity cue {:?}", cue),
                0.85,
                now,
            );
        }

        if let Some(cue) = contains_cue(&content, POLICY_CUES) {
            return self.prediction(
                HorizonCategory::Policy,
                format!("standing-rule cue {:?}", cue),
                0.8,
                now,
            );
        }

        match category {
            Some("person") => {
                return self.prediction(
                    HorizonCategory::Relational,
                    "person-category chunk".to_string(),
                    0.75,
                    now,
                );
            }
            Some("preference") | Some("lesson") => {
                return self.prediction(
                    HorizonCategory::Policy,
                    format!("{} chunks encode standing behavior", category.unwrap_or("")),
                    0.7,
                    now,
                );
            }
            Some("event") => {
                return self.prediction(
                    HorizonCategory::Ephemeral,
                    "event chunks age out quickly".to_string(),
                    0.7,
                    now,
                );
            }
            _ => {}
        }

        if let Some(cue) = contains_cue(&content, EPHEMERAL_CUES) {
            return self.prediction(
                HorizonCategory::Ephemeral,
                format!("near-term cue {:?}", cue),
                0.75,
                now,
            );
        }

        if let Some(cue) = contains_cue(&content, SITUATIONAL_CUES) {
            return self.prediction(
                HorizonCategory::Situational,
                format!("situation-bound cue {:?}", cue),
                0.7,
                now,
            );
        }

        if !input.tags.dimension(TagDimension::Projects).is_empty() {
            return self.prediction(
                HorizonCategory::ProjectScoped,
                "tagged with a project".to_string(),
                0.65,
                now,
            );
        }

        if !input.tags.dimension(TagDimension::People).is_empty() {
            return self.prediction(
                HorizonCategory::Relational,
                "tagged with a person".to_string(),
                0.6,
                now,
            );
        }

        self.prediction(
            HorizonCategory::Situational,
            "no strong cue, defaulting to situational".to_string(),
            0.4,
            now,
        )
    }

    fn prediction(
        &self,
        category: HorizonCategory,
        reasoning: String,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> HorizonPrediction {
        HorizonPrediction {
            relevance_horizon: category_window(category).map(|window| now + window),
            category,
            reasoning,
            confidence,
        }
    }
}

/// Apply a prediction to a chunk input in place
pub fn apply_prediction(input: &mut ChunkInput, prediction: &HorizonPrediction) {
    input.relevance_horizon = prediction.relevance_horizon;
    input.horizon_category = Some(prediction.category);
    input.horizon_reasoning = Some(prediction.reasoning.clone());
    input.horizon_confidence = Some(prediction.confidence);
}

// ============================================================================
// TESTS
// ============================================================================
