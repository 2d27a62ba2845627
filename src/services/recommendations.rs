use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::BookStore,
    error::{AppResult, ProviderResult},
    models::{
        Candidate, NewRecommendation, Preferences, Recommendation, RecommendationCandidate,
        RecommendationType,
    },
    services::fallback,
};

/// Upper bound on recommendations per generation call
pub const MAX_RECOMMENDATIONS: usize = 20;

/// Trait for the primary recommendation generator.
///
/// Implemented by the language-model client; the recommender treats any
/// implementation failure as a signal to use the rule-based fallback, so
/// implementations should fail loudly rather than return partial garbage.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationModel: Send + Sync {
    /// Generate up to `count` ranked recommendations for the given
    /// preferences and recognized shelf books.
    async fn generate(
        &self,
        preferences: &Preferences,
        shelf_books: &[Candidate],
        count: usize,
    ) -> ProviderResult<Vec<RecommendationCandidate>>;
}

/// Generates and persists personalized recommendations.
///
/// Primary path is the language model; any model failure (error, malformed
/// output, empty output) silently falls back to the rule-based seed
/// generator, which cannot fail. The caller therefore always receives at
/// least one recommendation unless persistence itself fails — storage
/// errors are never swallowed.
pub struct Recommender {
    model: Option<Arc<dyn RecommendationModel>>,
    store: Arc<dyn BookStore>,
}

impl Recommender {
    pub fn new(model: Option<Arc<dyn RecommendationModel>>, store: Arc<dyn BookStore>) -> Self {
        Self { model, store }
    }

    /// Generates recommendations and persists them as one atomic batch.
    ///
    /// Returns the created rows with their assigned ids; the requested
    /// count is clamped to 1..=20.
    pub async fn recommend(
        &self,
        session_id: Uuid,
        preferences: &Preferences,
        shelf_books: &[Candidate],
        scan_id: Option<String>,
        count: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let count = count.clamp(1, MAX_RECOMMENDATIONS);

        let (candidates, recommendation_type) =
            self.generate_candidates(preferences, shelf_books, count).await;

        let batch: Vec<NewRecommendation> = candidates
            .into_iter()
            .map(|candidate| NewRecommendation {
                candidate,
                recommendation_type,
            })
            .collect();

        let saved = self
            .store
            .save_recommendations(session_id, scan_id, batch)
            .await?;

        tracing::info!(
            session_id = %session_id,
            count = saved.len(),
            recommendation_type = recommendation_type.as_str(),
            "Recommendations generated"
        );

        Ok(saved)
    }

    /// Runs the primary generator with fallback on any failure.
    ///
    /// An empty primary result is treated as a failure: returning zero
    /// recommendations would break the at-least-one guarantee.
    async fn generate_candidates(
        &self,
        preferences: &Preferences,
        shelf_books: &[Candidate],
        count: usize,
    ) -> (Vec<RecommendationCandidate>, RecommendationType) {
        if let Some(model) = &self.model {
            match model.generate(preferences, shelf_books, count).await {
                Ok(generated) => {
                    let validated = sanitize_candidates(generated);
                    if !validated.is_empty() {
                        return (validated, RecommendationType::Ai);
                    }
                    tracing::warn!("Primary generator returned no usable recommendations");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Primary generator failed, using rule-based fallback");
                }
            }
        }

        (
            fallback::rule_based_recommendations(preferences, count),
            RecommendationType::RuleBased,
        )
    }
}

/// Enforces the candidate invariants regardless of which model produced
/// them: titles must be non-empty, reasons must explain the pick.
fn sanitize_candidates(candidates: Vec<RecommendationCandidate>) -> Vec<RecommendationCandidate> {
    candidates
        .into_iter()
        .filter(|c| !c.title.trim().is_empty())
        .map(|mut c| {
            if c.reason.trim().is_empty() {
                c.reason = "Recommended based on your reading preferences".to_string();
            }
            c.appeal_score = c.appeal_score.clamp(0.0, 1.0);
            c
        })
        .collect()
}
