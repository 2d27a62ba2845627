use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod preferences;

pub use preferences::Preferences;

/// A single book guess extracted from a shelf image.
///
/// Candidates are the only shape that crosses from the provider layer into
/// the rest of the system; raw provider responses never leave their client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub author: Option<String>,
    /// Identification confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Free-form location descriptor, e.g. "top shelf, left side"
    pub position: Option<String>,
}

/// Which provider produced the candidates of a scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderUsed {
    Primary,
    Secondary,
    None,
}

/// Result envelope produced once per scan request, immutable after construction.
///
/// Invariant: when `success` is false, `candidates` is empty and
/// `provider_used` is `None`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub scan_id: String,
    /// Ordered by descending confidence
    pub candidates: Vec<Candidate>,
    pub provider_used: ProviderUsed,
    pub success: bool,
    pub error_detail: Option<String>,
    /// Wall-clock time spent on the scan, in seconds
    pub elapsed_secs: f64,
}

/// A stored catalog book, created on demand when a recommendation
/// references a previously unseen title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    /// Where the record came from ("ai_recommendation", "rule_based", ...)
    pub source: Option<String>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Ai,
    RuleBased,
    Similar,
    Popular,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Ai => "ai",
            RecommendationType::RuleBased => "rule_based",
            RecommendationType::Similar => "similar",
            RecommendationType::Popular => "popular",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "rule_based" => RecommendationType::RuleBased,
            "similar" => RecommendationType::Similar,
            "popular" => RecommendationType::Popular,
            _ => RecommendationType::Ai,
        }
    }

    /// Source tag recorded on catalog books created for this recommendation type
    pub fn book_source(&self) -> &'static str {
        match self {
            RecommendationType::RuleBased => "rule_based",
            _ => "ai_recommendation",
        }
    }
}

/// Output of a recommendation generator, before persistence.
///
/// Invariant: `reason` is always non-empty; every recommendation must be
/// explainable to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationCandidate {
    pub title: String,
    pub author: Option<String>,
    pub reason: String,
    /// Estimated appeal in [0.0, 1.0]
    pub appeal_score: f64,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    /// Title of the scanned shelf book this recommendation resembles
    pub similarity_to: Option<String>,
}

/// A recommendation candidate ready to be written by the storage collaborator
#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub candidate: RecommendationCandidate,
    pub recommendation_type: RecommendationType,
}

/// A persisted recommendation row joined with its catalog book
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub session_id: Uuid,
    pub book: Book,
    pub reason: String,
    pub score: f64,
    pub similarity_to: Option<String>,
    pub scan_id: Option<String>,
    pub recommendation_type: RecommendationType,
    pub is_saved: bool,
    pub is_interested: Option<bool>,
    pub is_purchased: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_used_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProviderUsed::Primary).unwrap(),
            r#""primary""#
        );
        assert_eq!(
            serde_json::to_string(&ProviderUsed::None).unwrap(),
            r#""none""#
        );
    }

    #[test]
    fn test_recommendation_type_round_trip() {
        for ty in [
            RecommendationType::Ai,
            RecommendationType::RuleBased,
            RecommendationType::Similar,
            RecommendationType::Popular,
        ] {
            assert_eq!(RecommendationType::from_str(ty.as_str()), ty);
        }
    }

    #[test]
    fn test_recommendation_type_from_unknown_defaults_to_ai() {
        assert_eq!(
            RecommendationType::from_str("collaborative"),
            RecommendationType::Ai
        );
    }

    #[test]
    fn test_book_source_tags() {
        assert_eq!(RecommendationType::Ai.book_source(), "ai_recommendation");
        assert_eq!(RecommendationType::RuleBased.book_source(), "rule_based");
    }

    #[test]
    fn test_candidate_deserializes_from_provider_json() {
        let json = r#"{
            "title": "The Name of the Wind",
            "author": "Patrick Rothfuss",
            "confidence": 0.92,
            "position": "second shelf, center"
        }"#;

        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.title, "The Name of the Wind");
        assert_eq!(candidate.author.as_deref(), Some("Patrick Rothfuss"));
        assert!((candidate.confidence - 0.92).abs() < f64::EPSILON);
    }
}
