/// Google Cloud Vision OCR provider
///
/// Fallback book identification backend. Runs TEXT_DETECTION over the shelf
/// image and hands the full-image text block to the normalization pipeline.
/// Explicitly lower-quality than the multimodal primary: the OCR heuristics
/// are noisy, so an image with no readable titles yields an empty candidate
/// list rather than an error.
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ProviderError, ProviderResult},
    models::Candidate,
    services::{providers::VisionProvider, text_extract},
};

#[derive(Clone)]
pub struct GoogleVisionProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<AnnotateError>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    description: String,
}

#[derive(Debug, Deserialize)]
struct AnnotateError {
    message: String,
}

impl GoogleVisionProvider {
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            timeout,
        }
    }

    /// Runs text detection and returns the full-image text block.
    ///
    /// The first annotation is the complete detected text in reading order;
    /// per-word annotations that follow it are ignored.
    async fn detect_text(&self, image: &[u8]) -> ProviderResult<String> {
        let url = format!("{}/images:annotate", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "requests": [{
                    "image": { "content": BASE64_STANDARD.encode(image) },
                    "features": [{ "type": "TEXT_DETECTION" }],
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Remote(format!(
                "Google Vision API returned status {}: {}",
                status, body
            )));
        }

        let annotate: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid annotate response: {}", e)))?;

        let result = annotate
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty annotate response".to_string()))?;

        if let Some(error) = result.error {
            return Err(ProviderError::Remote(format!(
                "Google Vision API error: {}",
                error.message
            )));
        }

        Ok(result
            .text_annotations
            .into_iter()
            .next()
            .map(|t| t.description)
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl VisionProvider for GoogleVisionProvider {
    async fn identify_books(
        &self,
        image: &[u8],
        max_candidates: usize,
    ) -> ProviderResult<Vec<Candidate>> {
        let full_text = self.detect_text(image).await?;
        let candidates = text_extract::extract_candidates(&full_text, max_candidates);

        tracing::info!(
            provider = "google_vision",
            candidates = candidates.len(),
            "OCR book extraction completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "google_vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_response_deserialization() {
        let body = r#"{
            "responses": [{
                "textAnnotations": [
                    { "description": "1984\nby George Orwell" },
                    { "description": "1984" }
                ]
            }]
        }"#;

        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.responses.len(), 1);
        assert_eq!(
            parsed.responses[0].text_annotations[0].description,
            "1984\nby George Orwell"
        );
    }

    #[test]
    fn test_annotate_response_with_error() {
        let body = r#"{
            "responses": [{
                "error": { "message": "image too large" }
            }]
        }"#;

        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.responses[0].text_annotations.is_empty());
        assert_eq!(
            parsed.responses[0].error.as_ref().unwrap().message,
            "image too large"
        );
    }

    #[test]
    fn test_annotate_response_without_text() {
        let parsed: AnnotateResponse = serde_json::from_str(r#"{"responses": [{}]}"#).unwrap();
        assert!(parsed.responses[0].text_annotations.is_empty());
        assert!(parsed.responses[0].error.is_none());
    }
}
