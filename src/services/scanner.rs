use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::{
    error::{ProviderError, ProviderResult},
    models::{Candidate, ProviderUsed, ScanResult},
    services::providers::VisionProvider,
};

/// Recognition orchestrator
///
/// Drives provider selection and fallback for a single scan request:
/// primary attempt first, then the OCR fallback, strictly sequential so the
/// paid primary is never raced against its fallback. Provider failures are
/// contained here and recorded as diagnostic detail; exactly one
/// `ScanResult` comes out of every call, even on total failure.
pub struct Scanner {
    primary: Option<Arc<dyn VisionProvider>>,
    fallback: Option<Arc<dyn VisionProvider>>,
    attempt_timeout: Duration,
}

impl Scanner {
    pub fn new(
        primary: Option<Arc<dyn VisionProvider>>,
        fallback: Option<Arc<dyn VisionProvider>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            attempt_timeout,
        }
    }

    /// Scans a shelf image for book candidates.
    ///
    /// `allow_fallback` is a caller-controlled policy knob: when false, a
    /// primary failure is terminal and the secondary provider is never
    /// invoked. Never errors for provider-level failures; the envelope
    /// carries `success = false` with diagnostic detail instead.
    pub async fn scan(
        &self,
        image: &[u8],
        max_candidates: usize,
        allow_fallback: bool,
    ) -> ScanResult {
        let started = Instant::now();
        let scan_id = Uuid::new_v4().to_string();

        if self.primary.is_none() && self.fallback.is_none() {
            return Self::failed(scan_id, "no provider configured".to_string(), started);
        }

        let mut failures: Vec<String> = Vec::new();

        match &self.primary {
            Some(primary) => {
                match self.attempt(primary.as_ref(), image, max_candidates).await {
                    Ok(candidates) => {
                        return Self::succeeded(scan_id, candidates, ProviderUsed::Primary, started);
                    }
                    Err(e) => {
                        tracing::warn!(provider = primary.name(), error = %e, "Primary provider failed");
                        failures.push(format!("{} failed: {}", primary.name(), e));
                        if !allow_fallback {
                            return Self::failed(scan_id, failures.join("; "), started);
                        }
                    }
                }
            }
            None => {
                failures.push(
                    ProviderError::Unavailable("primary provider".to_string()).to_string(),
                );
            }
        }

        if allow_fallback {
            match &self.fallback {
                Some(fallback) => {
                    match self.attempt(fallback.as_ref(), image, max_candidates).await {
                        Ok(candidates) => {
                            return Self::succeeded(
                                scan_id,
                                candidates,
                                ProviderUsed::Secondary,
                                started,
                            );
                        }
                        Err(e) => {
                            tracing::warn!(provider = fallback.name(), error = %e, "Fallback provider failed");
                            failures.push(format!("{} failed: {}", fallback.name(), e));
                        }
                    }
                }
                None => {
                    failures.push(
                        ProviderError::Unavailable("fallback provider".to_string()).to_string(),
                    );
                }
            }
        }

        Self::failed(scan_id, failures.join("; "), started)
    }

    /// Runs one provider attempt under the per-attempt timeout.
    ///
    /// The timeout keeps a hung primary from starving the fallback attempt.
    async fn attempt(
        &self,
        provider: &dyn VisionProvider,
        image: &[u8],
        max_candidates: usize,
    ) -> ProviderResult<Vec<Candidate>> {
        match tokio::time::timeout(
            self.attempt_timeout,
            provider.identify_books(image, max_candidates),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} did not answer within {}s",
                provider.name(),
                self.attempt_timeout.as_secs()
            ))),
        }
    }

    fn succeeded(
        scan_id: String,
        candidates: Vec<Candidate>,
        provider_used: ProviderUsed,
        started: Instant,
    ) -> ScanResult {
        let result = ScanResult {
            scan_id,
            candidates,
            provider_used,
            success: true,
            error_detail: None,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        tracing::info!(
            scan_id = %result.scan_id,
            candidates = result.candidates.len(),
            provider_used = ?result.provider_used,
            elapsed_secs = result.elapsed_secs,
            "Scan completed"
        );

        result
    }

    fn failed(scan_id: String, error_detail: String, started: Instant) -> ScanResult {
        tracing::warn!(scan_id = %scan_id, detail = %error_detail, "Scan failed on all providers");

        ScanResult {
            scan_id,
            candidates: Vec::new(),
            provider_used: ProviderUsed::None,
            success: false,
            error_detail: Some(error_detail),
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }
}
