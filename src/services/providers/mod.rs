/// Vision provider abstraction
///
/// This module provides a pluggable architecture for book identification
/// backends (OpenAI multimodal, Google Cloud Vision OCR). Providers are
/// swappable and ordered by the scanner: the orchestrator never sees a
/// provider-specific response shape, only normalized `Candidate`s.
use crate::{error::ProviderResult, models::Candidate};

pub mod google_vision;
pub mod openai;

/// Trait for book identification providers
///
/// Implementations own their credentials and HTTP plumbing; an unconfigured
/// provider is simply never constructed, so `identify_books` can assume a
/// usable client.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Identify up to `max_candidates` books in a shelf image.
    ///
    /// Returns candidates already validated and capped; raw provider output
    /// never crosses this boundary.
    async fn identify_books(
        &self,
        image: &[u8],
        max_candidates: usize,
    ) -> ProviderResult<Vec<Candidate>>;

    /// Provider name for logging and scan diagnostics
    fn name(&self) -> &'static str;
}
