/// OpenAI provider
///
/// Primary book identification backend (vision model over the shelf photo)
/// and the primary recommendation generator (text model over preferences and
/// recognized books). Both requests instruct the model to answer with a
/// strict JSON array; the parser tolerates prose wrapped around the array
/// but treats anything unparseable as `ProviderError::Malformed` rather
/// than returning partial data.
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{ProviderError, ProviderResult},
    models::{Candidate, Preferences, RecommendationCandidate},
    services::{providers::VisionProvider, recommendations::RecommendationModel},
};

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    vision_model: String,
    text_model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        api_url: String,
        vision_model: String,
        text_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            vision_model,
            text_model,
            timeout,
        }
    }

    async fn chat_completion(&self, model: &str, content: Value) -> ProviderResult<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": [{ "role": "user", "content": content }],
                "max_tokens": 1500,
                "temperature": 0.1,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Remote(format!(
                "OpenAI API returned status {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid chat response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("chat response had no content".to_string()))
    }

    fn identification_prompt(max_candidates: usize) -> String {
        format!(
            "You are an expert librarian and book identifier. Analyze this bookshelf image \
             and identify up to {max_candidates} books.\n\
             For each book you can clearly identify, provide the title exactly as shown on \
             the spine, the author if visible, a confidence level from 0.0 to 1.0, and a \
             position description (e.g. \"top shelf, left side\").\n\
             Rules: only identify books where you can clearly read the title; do not guess \
             or invent titles; score confidence honestly, lower for unclear text.\n\
             Return your response as a JSON array of objects with keys \"title\", \"author\", \
             \"confidence\", and \"position\" (author and position may be null).\n\
             Important: return ONLY the JSON array, no other text."
        )
    }

    fn recommendation_prompt(
        preferences: &Preferences,
        shelf_books: &[Candidate],
        count: usize,
    ) -> String {
        format!(
            "You are an expert book recommender. Based on the user's reading preferences \
             and the books they encountered on a shelf, recommend exactly {count} books they \
             might enjoy, ranked from best match to worst.\n\n\
             User's reading preferences:\n{prefs}\n\n\
             Books found on shelf:\n{shelf}\n\n\
             Recommendations must align with stated preferences, consider similarity to the \
             shelf books, mix popular and lesser-known titles, and respect any dislikes.\n\
             Return a JSON array of objects with keys \"title\", \"author\", \"reason\", \
             \"similarity_to\", \"appeal_score\", \"genre\", and \"publication_year\" \
             (similarity_to, genre, and publication_year may be null).\n\
             Return ONLY the JSON array.",
            prefs = preferences.as_prompt_context(),
            shelf = format_shelf_books(shelf_books),
        )
    }
}

#[async_trait::async_trait]
impl VisionProvider for OpenAiProvider {
    async fn identify_books(
        &self,
        image: &[u8],
        max_candidates: usize,
    ) -> ProviderResult<Vec<Candidate>> {
        let encoded = BASE64_STANDARD.encode(image);

        let content = json!([
            { "type": "text", "text": Self::identification_prompt(max_candidates) },
            {
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/jpeg;base64,{}", encoded),
                    "detail": "high",
                }
            }
        ]);

        let reply = self.chat_completion(&self.vision_model, content).await?;
        let candidates = parse_candidates(&reply, max_candidates)?;

        tracing::info!(
            provider = "openai",
            candidates = candidates.len(),
            "Book identification completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait::async_trait]
impl RecommendationModel for OpenAiProvider {
    async fn generate(
        &self,
        preferences: &Preferences,
        shelf_books: &[Candidate],
        count: usize,
    ) -> ProviderResult<Vec<RecommendationCandidate>> {
        let prompt = Self::recommendation_prompt(preferences, shelf_books, count);
        let content = json!([{ "type": "text", "text": prompt }]);

        let reply = self.chat_completion(&self.text_model, content).await?;
        let recommendations = parse_recommendations(&reply, count)?;

        tracing::info!(
            provider = "openai",
            recommendations = recommendations.len(),
            "Recommendation generation completed"
        );

        Ok(recommendations)
    }
}

/// Formats recognized shelf books as prompt context
fn format_shelf_books(books: &[Candidate]) -> String {
    if books.is_empty() {
        return "No books were clearly identified from the shelf image".to_string();
    }

    books
        .iter()
        .map(|b| {
            format!(
                "- {} by {} (confidence: {:.1})",
                b.title,
                b.author.as_deref().unwrap_or("unknown author"),
                b.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Locates the first top-level JSON array in model output.
///
/// Models occasionally wrap the requested array in prose or a markdown
/// fence despite instructions; everything outside the outermost brackets
/// is discarded.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parses and validates the identification response.
///
/// Entries without a usable title are dropped; a response that is not a
/// JSON array at all is a malformed-provider failure, not a partial result.
fn parse_candidates(reply: &str, max_candidates: usize) -> ProviderResult<Vec<Candidate>> {
    let array = extract_json_array(reply)
        .ok_or_else(|| ProviderError::Malformed("no JSON array in model output".to_string()))?;

    let values: Vec<Value> = serde_json::from_str(array)
        .map_err(|e| ProviderError::Malformed(format!("invalid candidate JSON: {}", e)))?;

    let mut candidates = Vec::new();
    for value in values.into_iter().take(max_candidates) {
        let Some(title) = value.get("title").and_then(Value::as_str) else {
            continue;
        };
        let title = title.trim();
        if title.is_empty() {
            continue;
        }

        candidates.push(Candidate {
            title: title.to_string(),
            author: non_empty_string(value.get("author")),
            confidence: coerce_score(value.get("confidence")),
            position: non_empty_string(value.get("position")),
        });
    }

    Ok(candidates)
}

/// Parses and validates the recommendation response
fn parse_recommendations(
    reply: &str,
    count: usize,
) -> ProviderResult<Vec<RecommendationCandidate>> {
    let array = extract_json_array(reply)
        .ok_or_else(|| ProviderError::Malformed("no JSON array in model output".to_string()))?;

    let values: Vec<Value> = serde_json::from_str(array)
        .map_err(|e| ProviderError::Malformed(format!("invalid recommendation JSON: {}", e)))?;

    let mut recommendations = Vec::new();
    for value in values.into_iter().take(count) {
        let Some(title) = value.get("title").and_then(Value::as_str) else {
            continue;
        };
        let title = title.trim();
        if title.is_empty() {
            continue;
        }

        let reason = value
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Recommended based on your reading preferences")
            .to_string();

        recommendations.push(RecommendationCandidate {
            title: title.to_string(),
            author: non_empty_string(value.get("author")),
            reason,
            appeal_score: coerce_score(value.get("appeal_score")),
            genre: non_empty_string(value.get("genre")),
            publication_year: value
                .get("publication_year")
                .and_then(Value::as_i64)
                .map(|y| y as i32),
            similarity_to: non_empty_string(value.get("similarity_to")),
        });
    }

    Ok(recommendations)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Coerces a score field to a float in [0.0, 1.0], defaulting to 0.5 when
/// missing or invalid
fn coerce_score(value: Option<&Value>) -> f64 {
    value
        .and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
        })
        .unwrap_or(0.5)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_array_plain() {
        let text = r#"[{"title": "Dune"}]"#;
        assert_eq!(extract_json_array(text), Some(text));
    }

    #[test]
    fn test_extract_json_array_wrapped_in_prose() {
        let text = "Sure! Here are the books:\n```json\n[{\"title\": \"Dune\"}]\n```\nEnjoy!";
        assert_eq!(extract_json_array(text), Some(r#"[{"title": "Dune"}]"#));
    }

    #[test]
    fn test_extract_json_array_missing() {
        assert_eq!(extract_json_array("I could not find any books."), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn test_parse_candidates_validates_titles() {
        let reply = r#"[
            {"title": "Dune", "author": "Frank Herbert", "confidence": 0.9},
            {"title": "   ", "confidence": 0.8},
            {"author": "No Title Given"},
            {"title": "Hyperion"}
        ]"#;

        let candidates = parse_candidates(reply, 20).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Dune");
        assert_eq!(candidates[1].title, "Hyperion");
        // Missing confidence coerces to the 0.5 default
        assert!((candidates[1].confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_candidates_coerces_string_confidence() {
        let reply = r#"[{"title": "Dune", "confidence": "0.75"}]"#;
        let candidates = parse_candidates(reply, 20).unwrap();
        assert!((candidates[0].confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_candidates_caps_at_max() {
        let reply = r#"[{"title": "A"}, {"title": "B"}, {"title": "C"}]"#;
        assert_eq!(parse_candidates(reply, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_candidates_rejects_non_array() {
        let err = parse_candidates(r#"{"title": "Dune"}"#, 20).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));

        let err = parse_candidates("no books here", 20).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[test]
    fn test_parse_recommendations_defaults() {
        let reply = r#"[{"title": "Piranesi", "appeal_score": 1.7}]"#;
        let recs = parse_recommendations(reply, 10).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Piranesi");
        assert!(!recs[0].reason.is_empty());
        // Out-of-range score clamps into [0, 1]
        assert!((recs[0].appeal_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_recommendations_full_entry() {
        let reply = r#"[{
            "title": "The Fifth Season",
            "author": "N. K. Jemisin",
            "reason": "Matches your fantasy preference",
            "similarity_to": "The Name of the Wind",
            "appeal_score": 0.85,
            "genre": "Fantasy",
            "publication_year": 2015
        }]"#;

        let recs = parse_recommendations(reply, 10).unwrap();
        assert_eq!(recs[0].author.as_deref(), Some("N. K. Jemisin"));
        assert_eq!(recs[0].similarity_to.as_deref(), Some("The Name of the Wind"));
        assert_eq!(recs[0].publication_year, Some(2015));
    }

    #[test]
    fn test_format_shelf_books_empty() {
        assert_eq!(
            format_shelf_books(&[]),
            "No books were clearly identified from the shelf image"
        );
    }

    #[test]
    fn test_format_shelf_books_lines() {
        let books = vec![Candidate {
            title: "1984".to_string(),
            author: Some("George Orwell".to_string()),
            confidence: 0.95,
            position: None,
        }];
        assert_eq!(
            format_shelf_books(&books),
            "- 1984 by George Orwell (confidence: 0.9)"
        );
    }
}
