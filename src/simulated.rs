//! Deterministic fallback analyzer.
//!
//! Produces a complete [`DocumentAnalysis`] from raw text with no external
//! dependencies. This is the recovery path when the inference provider is
//! unavailable and the correctness oracle for the engine's output shape:
//! two calls with identical input produce byte-identical output.

use std::collections::HashMap;

use crate::models::{
    reading_time_minutes, word_count, Complexity, DocumentAnalysis, Entity, EntityLabel,
    Sentiment, SentimentLabel, SummarySet,
};

/// Tokens dropped during keyword extraction, beyond the length<=3 filter.
const STOPWORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "will", "your", "they", "been", "were", "their",
    "would", "there", "which", "about", "when", "what", "then", "them", "these", "than", "some",
    "into", "could", "other", "more", "also", "only", "over", "such", "very", "because", "after",
    "before", "where", "while", "being", "does", "each", "most", "said", "should",
];

/// Words counted toward positive sentiment (substring, case-insensitive).
const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "wonderful", "amazing", "fantastic", "positive", "success",
    "benefit", "improve", "love", "happy",
];

/// Words counted toward negative sentiment (substring, case-insensitive).
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "poor", "terrible", "awful", "horrible", "negative", "fail", "problem", "issue",
    "worse", "hate", "broken",
];

const MAX_SIMULATED_KEYWORDS: usize = 8;
const SIMULATED_TOPIC_COUNT: usize = 3;

pub struct SimulatedAnalyzer;

impl SimulatedAnalyzer {
    pub fn new() -> SimulatedAnalyzer {
        SimulatedAnalyzer
    }

    /// Analyze `text` deterministically. The file name hint only feeds the
    /// placeholder entity.
    pub fn analyze(&self, text: &str, file_name_hint: Option<&str>) -> DocumentAnalysis {
        let words = word_count(text);
        let reading_time = reading_time_minutes(words);
        let keywords = extract_keywords(text);
        let topics: Vec<String> = keywords.iter().take(SIMULATED_TOPIC_COUNT).cloned().collect();
        let sentiment = score_sentiment(text);
        let complexity = Complexity::from_word_count(words);

        let entity_text = file_name_hint.unwrap_or("document").to_string();
        let entities = vec![Entity {
            end: entity_text.chars().count(),
            text: entity_text,
            label: EntityLabel::Misc,
            confidence: 0.8,
            start: 0,
        }];

        DocumentAnalysis {
            summary: build_summaries(words, sentiment.label, reading_time),
            sentiment,
            keywords,
            topics,
            entities,
            word_count: words,
            reading_time,
            complexity,
            embedding: None,
        }
    }
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, strip non-alphanumeric characters, split on whitespace, drop
/// short tokens and stopwords.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| word.len() > 3 && !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Frequency-ranked keywords, descending by count. Ties keep first-occurrence
/// order (the sort is stable over a first-occurrence-ordered list).
fn extract_keywords(text: &str) -> Vec<String> {
    let tokens = tokenize(text);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for token in &tokens {
        let entry = counts.entry(token.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(token.as_str());
        }
        *entry += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order
        .iter()
        .map(|token| (*token, counts[token]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(MAX_SIMULATED_KEYWORDS)
        .map(|(token, _)| token.to_string())
        .collect()
}

/// Count fixed wordlist occurrences across the whole text (substring match)
/// and derive a bounded score.
fn score_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let pos: usize = POSITIVE_WORDS.iter().map(|w| lower.matches(w).count()).sum();
    let neg: usize = NEGATIVE_WORDS.iter().map(|w| lower.matches(w).count()).sum();

    let (score, label) = if pos > neg {
        let score = (pos as f64 / (pos + neg + 1) as f64).min(0.8);
        (score, SentimentLabel::Positive)
    } else if neg > pos {
        let score = -(neg as f64 / (pos + neg + 1) as f64).min(0.8);
        (score, SentimentLabel::Negative)
    } else {
        (0.0, SentimentLabel::Neutral)
    };

    Sentiment {
        score,
        label,
        confidence: 0.7,
    }
}

/// Templated summaries, reproducible from word count, label, and reading
/// time alone.
fn build_summaries(words: u64, label: SentimentLabel, reading_time: u32) -> SummarySet {
    let short = format!(
        "A {}-word document with an overall {} tone. Estimated reading time: {} minute(s).",
        words,
        label.as_str(),
        reading_time
    );
    let medium = format!(
        "This document contains {} words and reads in roughly {} minute(s). \
         The language carries a {} tone overall. This summary was produced by \
         the local analyzer without a remote language model.",
        words,
        reading_time,
        label.as_str()
    );
    let detailed = format!(
        "Locally generated analysis. The document contains {} words, giving an \
         estimated reading time of {} minute(s) at 200 words per minute. Word \
         frequency analysis determined the dominant terms, and a fixed-wordlist \
         scan classified the overall tone as {}. For richer summaries, configure \
         an inference provider and reprocess the document.",
        words,
        reading_time,
        label.as_str()
    );
    SummarySet {
        short,
        medium,
        detailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "This is a great, great, wonderful product that works well. Tested by Acme Corp.";

    #[test]
    fn analysis_is_deterministic() {
        let analyzer = SimulatedAnalyzer::new();
        let a = analyzer.analyze(SAMPLE, Some("review.txt"));
        let b = analyzer.analyze(SAMPLE, Some("review.txt"));
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_words_rank_first() {
        let analyzer = SimulatedAnalyzer::new();
        let analysis = analyzer.analyze(SAMPLE, None);
        assert_eq!(analysis.keywords[0], "great");
        assert!(analysis.keywords.contains(&"wonderful".to_string()));
    }

    #[test]
    fn sample_text_is_positive() {
        let analyzer = SimulatedAnalyzer::new();
        let analysis = analyzer.analyze(SAMPLE, None);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Positive);
        // pos = 3 (great, great, wonderful), neg = 0: min(0.8, 3/4)
        assert!((analysis.sentiment.score - 0.75).abs() < 1e-9);
        assert!((analysis.sentiment.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn negative_text_is_symmetric() {
        let analysis = SimulatedAnalyzer::new().analyze("a terrible, awful failure", None);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Negative);
        // neg = 3 (terrible, awful, fail), pos = 0: -min(0.8, 3/4)
        assert!((analysis.sentiment.score + 0.75).abs() < 1e-9);
    }

    #[test]
    fn wordless_text_is_neutral() {
        let analysis = SimulatedAnalyzer::new().analyze("the quick brown fox", None);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Neutral);
        assert_eq!(analysis.sentiment.score, 0.0);
    }

    #[test]
    fn score_is_capped_at_point_eight() {
        let text = "great ".repeat(50);
        let analysis = SimulatedAnalyzer::new().analyze(&text, None);
        assert!((analysis.sentiment.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn short_tokens_and_stopwords_are_dropped() {
        let keywords = extract_keywords("this is a cat with some keyboards");
        assert!(!keywords.contains(&"this".to_string()));
        assert!(!keywords.contains(&"cat".to_string()));
        assert!(keywords.contains(&"keyboards".to_string()));
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let keywords = extract_keywords("zebra apple zebra apple mango");
        assert_eq!(keywords[0], "zebra");
        assert_eq!(keywords[1], "apple");
        assert_eq!(keywords[2], "mango");
    }

    #[test]
    fn topics_are_first_three_keywords() {
        let analysis = SimulatedAnalyzer::new().analyze(SAMPLE, None);
        assert_eq!(
            analysis.topics,
            analysis.keywords[..3.min(analysis.keywords.len())].to_vec()
        );
    }

    #[test]
    fn placeholder_entity_uses_hint() {
        let analysis = SimulatedAnalyzer::new().analyze("some text here", Some("q3-report.txt"));
        assert_eq!(analysis.entities.len(), 1);
        let entity = &analysis.entities[0];
        assert_eq!(entity.text, "q3-report.txt");
        assert_eq!(entity.label, EntityLabel::Misc);
        assert!((entity.confidence - 0.8).abs() < 1e-9);
        assert!(entity.start <= entity.end);
    }

    #[test]
    fn summaries_fit_their_caps() {
        let text = "word ".repeat(5000);
        let analysis = SimulatedAnalyzer::new().analyze(&text, None);
        assert!(analysis.summary.short.chars().count() <= crate::models::SUMMARY_SHORT_MAX);
        assert!(analysis.summary.medium.chars().count() <= crate::models::SUMMARY_MEDIUM_MAX);
        assert!(analysis.summary.detailed.chars().count() <= crate::models::SUMMARY_DETAILED_MAX);
        assert_eq!(analysis.complexity, Complexity::Complex);
    }
}
