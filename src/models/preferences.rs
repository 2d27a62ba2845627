use serde::{Deserialize, Serialize};

/// Reading preferences owned by a session.
///
/// All attributes are optional and independently settable; the
/// recommendation pipeline treats this as a read-only value object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub favorite_genres: Vec<String>,
    #[serde(default)]
    pub disliked_genres: Vec<String>,
    #[serde(default)]
    pub favorite_authors: Vec<String>,
    pub preferred_length: Option<String>,
    pub preferred_publication_era: Option<String>,
    /// beginner, intermediate, advanced, expert
    pub reading_experience: Option<String>,
    /// How open the reader is to unfamiliar genres/authors, in [0.0, 1.0]
    pub discovery_openness: Option<f64>,
    /// Titles the reader has already finished
    #[serde(default)]
    pub reading_history: Vec<String>,
}

impl Preferences {
    /// Renders preferences as prompt context for the recommendation model.
    ///
    /// Only stated preferences are included; a reader with none gets an
    /// explicit placeholder so the model is not left guessing.
    pub fn as_prompt_context(&self) -> String {
        let mut lines = Vec::new();

        if !self.favorite_genres.is_empty() {
            lines.push(format!("Favorite genres: {}", self.favorite_genres.join(", ")));
        }
        if !self.disliked_genres.is_empty() {
            lines.push(format!("Dislikes: {}", self.disliked_genres.join(", ")));
        }
        if !self.favorite_authors.is_empty() {
            lines.push(format!(
                "Favorite authors: {}",
                self.favorite_authors.join(", ")
            ));
        }
        if let Some(experience) = &self.reading_experience {
            lines.push(format!("Reading level: {}", experience));
        }
        if let Some(length) = &self.preferred_length {
            lines.push(format!("Preferred book length: {}", length));
        }
        if let Some(era) = &self.preferred_publication_era {
            lines.push(format!("Preferred publication era: {}", era));
        }
        if !self.reading_history.is_empty() {
            lines.push(format!(
                "Recently read: {}",
                self.reading_history.join(", ")
            ));
        }

        if lines.is_empty() {
            "No specific preferences provided".to_string()
        } else {
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_preferences_prompt_placeholder() {
        let prefs = Preferences::default();
        assert_eq!(prefs.as_prompt_context(), "No specific preferences provided");
    }

    #[test]
    fn test_prompt_context_includes_stated_fields_only() {
        let prefs = Preferences {
            favorite_genres: vec!["Fantasy".to_string(), "Memoir".to_string()],
            reading_experience: Some("advanced".to_string()),
            ..Default::default()
        };

        let context = prefs.as_prompt_context();
        assert!(context.contains("Favorite genres: Fantasy, Memoir"));
        assert!(context.contains("Reading level: advanced"));
        assert!(!context.contains("Dislikes"));
        assert!(!context.contains("book length"));
    }

    #[test]
    fn test_preferences_deserialize_with_missing_fields() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"favorite_genres": ["Science Fiction"]}"#).unwrap();
        assert_eq!(prefs.favorite_genres, vec!["Science Fiction"]);
        assert!(prefs.disliked_genres.is_empty());
        assert_eq!(prefs.discovery_openness, None);
    }
}
