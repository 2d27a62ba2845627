use std::sync::OnceLock;

use regex::Regex;

use crate::models::Candidate;

/// Turns a raw OCR text blob into cleaned, deduplicated, confidence-scored
/// book candidates.
///
/// The input is the full-image text block in natural reading order,
/// newline-separated. OCR output is inherently noisy, so everything here is
/// heuristic; the pipeline never fails, it just produces fewer candidates.
const STOP_WORDS: [&str; 12] = [
    "the", "a", "an", "and", "or", "but", "of", "in", "on", "at", "to", "for",
];

/// Title/author separators, tried in priority order on the first occurrence.
/// OCR engines emit both en and em dashes for spine dashes.
const SEPARATORS: [&str; 6] = [" by ", " BY ", " - ", " – ", " — ", " | "];

fn metadata_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\d+$",          // bare numbers
            r"isbn",           // ISBN references
            r"^\$\d+",         // prices
            r"^\d{4}$",        // years
            r"^[a-z]{2,4}\d+", // catalog codes
            r"barcode",
            r"copyright",
            r"edition",
            r"published",
            r"pages?",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("invalid metadata pattern"))
        .collect()
    })
}

fn non_title_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^\w\s\-–—:.,'"()]"#).expect("invalid char pattern"))
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{3,}").expect("invalid digit pattern"))
}

/// Extracts book candidates from detected shelf text.
///
/// Stops once `max_candidates` lines are accepted; the final list is sorted
/// by descending confidence. An input with no usable lines yields an empty
/// list, never an error.
pub fn extract_candidates(full_text: &str, max_candidates: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut seen_titles: Vec<String> = Vec::new();

    for line in merge_continuation_lines(full_text) {
        if line.chars().count() < 3 {
            continue;
        }

        if is_likely_metadata(&line) {
            continue;
        }

        let cleaned = clean_title(&line);
        if cleaned.is_empty() {
            continue;
        }

        let lowered = cleaned.to_lowercase();
        if seen_titles.contains(&lowered) {
            continue;
        }

        let confidence = estimate_confidence(&cleaned);
        let (title, author) = split_title_author(&cleaned);

        candidates.push(Candidate {
            title,
            author,
            confidence,
            position: None,
        });
        seen_titles.push(lowered);

        if candidates.len() >= max_candidates {
            break;
        }
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    candidates
}

/// Splits the blob into non-empty trimmed lines, merging an author
/// continuation line ("by George Orwell") onto the line above it.
///
/// Spines often put the author on a separate line; without the merge the
/// title line and its "by ..." line would be scored as unrelated candidates.
fn merge_continuation_lines(full_text: &str) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();

    for line in full_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let lowered = trimmed.to_lowercase();
        if lowered.starts_with("by ") {
            if let Some(prev) = merged.last_mut() {
                prev.push(' ');
                prev.push_str(trimmed);
                continue;
            }
        }

        merged.push(trimmed.to_string());
    }

    merged
}

/// Checks whether a line looks like publishing metadata rather than a title
fn is_likely_metadata(text: &str) -> bool {
    let lowered = text.to_lowercase();
    metadata_patterns().iter().any(|re| re.is_match(&lowered))
}

/// Strips OCR artifacts and collapses whitespace.
///
/// Lines with more than two words additionally lose short stop-words, which
/// are frequent OCR misreads; a stop-word longer than three characters is
/// never dropped.
fn clean_title(text: &str) -> String {
    let stripped = non_title_chars().replace_all(text, " ");
    let words: Vec<&str> = stripped.split_whitespace().collect();

    let kept: Vec<&str> = if words.len() > 2 {
        words
            .into_iter()
            .filter(|w| {
                let lowered = w.to_lowercase();
                !STOP_WORDS.contains(&lowered.as_str()) || w.chars().count() > 3
            })
            .collect()
    } else {
        words
    };

    kept.join(" ")
}

/// Splits combined text into title and author on the first separator hit
fn split_title_author(text: &str) -> (String, Option<String>) {
    for sep in SEPARATORS {
        if let Some((title, author)) = text.split_once(sep) {
            return (title.trim().to_string(), Some(author.trim().to_string()));
        }
    }

    (text.trim().to_string(), None)
}

/// Scores how title-like a cleaned line is, clamped to [0.1, 1.0]
fn estimate_confidence(text: &str) -> f64 {
    let mut confidence: f64 = 0.5;

    let words: Vec<&str> = text.split_whitespace().collect();

    if text.chars().count() > 5 {
        confidence += 0.1;
    }
    if words.len() > 1 {
        confidence += 0.1;
    }
    if text.chars().next().is_some_and(|c| c.is_uppercase()) {
        confidence += 0.1;
    }
    if words
        .iter()
        .skip(1)
        .any(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
    {
        confidence += 0.1;
    }

    if digit_run().is_match(text) {
        confidence -= 0.2;
    }
    if text.chars().count() > 100 {
        confidence -= 0.2;
    }

    confidence.clamp(0.1, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_title_and_author_across_lines() {
        let text = "1984\nby George Orwell\nISBN 978-0-452-28423-4\nCopyright 1949";
        let candidates = extract_candidates(text, 20);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "1984");
        assert_eq!(candidates[0].author.as_deref(), Some("George Orwell"));
        assert!(candidates[0].confidence >= 0.5);
    }

    #[test]
    fn test_discards_metadata_lines() {
        for line in [
            "1234567890",
            "ISBN 978-1-56619-909-4",
            "$19.99",
            "2017",
            "AB1234",
            "barcode area",
            "Copyright 2020",
            "Second Edition",
            "Published in London",
            "352 pages",
        ] {
            assert!(is_likely_metadata(line), "expected metadata: {line}");
        }

        assert!(!is_likely_metadata("The Remains of the Day"));
    }

    #[test]
    fn test_discards_short_lines() {
        let candidates = extract_candidates("ab\nx\nThe Hobbit", 20);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "The Hobbit");
    }

    #[test]
    fn test_clean_title_drops_stop_words_only_in_long_lines() {
        // Three or more words: short stop-words go
        assert_eq!(clean_title("The Lord of Rings"), "Lord Rings");
        // Two words or fewer: untouched
        assert_eq!(clean_title("The Road"), "The Road");
    }

    #[test]
    fn test_clean_title_strips_artifacts_and_collapses_whitespace() {
        assert_eq!(clean_title("Dune*   Messiah##"), "Dune Messiah");
        assert_eq!(clean_title("Wolf Hall: Novel"), "Wolf Hall: Novel");
    }

    #[test]
    fn test_split_title_author_separator_priority() {
        let (title, author) = split_title_author("Beloved by Toni Morrison");
        assert_eq!(title, "Beloved");
        assert_eq!(author.as_deref(), Some("Toni Morrison"));

        let (title, author) = split_title_author("Circe - Madeline Miller");
        assert_eq!(title, "Circe");
        assert_eq!(author.as_deref(), Some("Madeline Miller"));

        let (title, author) = split_title_author("Middlemarch");
        assert_eq!(title, "Middlemarch");
        assert_eq!(author, None);
    }

    #[test]
    fn test_dash_separators_survive_cleaning_and_split() {
        // En and em dashes must not be stripped as OCR artifacts; either
        // width splits title from author through the full pipeline.
        for text in ["Circe – Madeline Miller", "Circe — Madeline Miller"] {
            let candidates = extract_candidates(text, 20);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].title, "Circe");
            assert_eq!(candidates[0].author.as_deref(), Some("Madeline Miller"));
        }
    }

    #[test]
    fn test_confidence_bounds() {
        // Minimal line: no boosts beyond base
        let short = estimate_confidence("abc");
        assert!((0.1..=1.0).contains(&short));

        // Long digit-heavy text takes both penalties
        let noisy = estimate_confidence(&"7".repeat(150));
        assert!((noisy - 0.2).abs() < 1e-9);

        // Title-case multi-word title earns every boost
        let strong = estimate_confidence("A Gentleman In Moscow");
        assert!((strong - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_all_candidates_within_confidence_range() {
        let text = "Some Title\nanother line of text\n99999 numbers 99999\nShort";
        for candidate in extract_candidates(text, 20) {
            assert!((0.1..=1.0).contains(&candidate.confidence));
            assert!(!candidate.title.is_empty());
        }
    }

    #[test]
    fn test_deduplicates_case_insensitively() {
        let candidates = extract_candidates("Wolf Hall\nWOLF HALL\nwolf hall", 20);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_sorted_by_descending_confidence() {
        let text = "lowercase line\nProper Title Case Line";
        let candidates = extract_candidates(text, 20);
        assert!(candidates.len() >= 2);
        for pair in candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_respects_max_candidates() {
        let text = "First Title\nSecond Title\nThird Title\nFourth Title";
        assert_eq!(extract_candidates(text, 2).len(), 2);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Pachinko\nMin Jin Lee\nThe Overstory\nRichard Powers\n2018";
        let first = extract_candidates(text, 20);
        let second = extract_candidates(text, 20);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_yields_empty_list() {
        assert!(extract_candidates("", 20).is_empty());
        assert!(extract_candidates("\n\n  \n", 20).is_empty());
    }
}
