//! Analysis engine: remote inference with validation and local fallback.
//!
//! [`AnalysisEngine::analyze`] never fails. It makes one attempt against the
//! injected [`InferenceProvider`]; on any failure — transport error, rate
//! limit, non-JSON payload, hostile schema — it logs the condition and falls
//! back to the deterministic [`SimulatedAnalyzer`].
//!
//! Remote output is handled in two stages so each is testable on its own:
//! 1. a permissive decode into [`RawAnalysis`], where every field is
//!    optional and list items are loosely typed;
//! 2. strict validation/defaulting into the canonical [`DocumentAnalysis`],
//!    which clamps ranges, truncates lists to their caps, and recomputes
//!    word count and reading time from the source text rather than trusting
//!    the model.

use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::error::PipelineError;
use crate::inference::InferenceProvider;
use crate::models::{
    reading_time_minutes, word_count, Complexity, DocumentAnalysis, Entity, EntityLabel,
    Sentiment, SentimentLabel, SummarySet, MAX_ENTITIES, MAX_KEYWORDS, MAX_TOPICS,
    SUMMARY_DETAILED_MAX, SUMMARY_MEDIUM_MAX, SUMMARY_SHORT_MAX,
};
use crate::simulated::SimulatedAnalyzer;

/// Character budget for document text included in the analysis prompt.
const PROMPT_CHAR_BUDGET: usize = 12_000;

/// Loosely-typed mirror of the model's JSON output. Every field is optional;
/// list items are raw JSON values so a single off-type item does not sink
/// the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAnalysis {
    summary: RawSummary,
    sentiment: RawSentiment,
    keywords: Vec<serde_json::Value>,
    topics: Vec<serde_json::Value>,
    entities: Vec<RawEntity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSummary {
    short: Option<String>,
    medium: Option<String>,
    detailed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSentiment {
    score: Option<f64>,
    label: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntity {
    text: Option<String>,
    label: Option<String>,
    confidence: Option<f64>,
    start: Option<usize>,
    end: Option<usize>,
}

pub struct AnalysisEngine {
    provider: Arc<dyn InferenceProvider>,
    fallback: SimulatedAnalyzer,
}

impl AnalysisEngine {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> AnalysisEngine {
        AnalysisEngine {
            provider,
            fallback: SimulatedAnalyzer::new(),
        }
    }

    /// Produce a fully-populated analysis for `text`. Infallible: any remote
    /// failure is recovered through the simulated analyzer.
    pub async fn analyze(&self, text: &str, file_name_hint: Option<&str>) -> DocumentAnalysis {
        match self.try_remote(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(
                    model = self.provider.model_name(),
                    error = %e,
                    "remote analysis failed, using simulated fallback"
                );
                self.fallback.analyze(text, file_name_hint)
            }
        }
    }

    async fn try_remote(&self, text: &str) -> Result<DocumentAnalysis, PipelineError> {
        let prompt = build_prompt(text);
        let completion = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()))?;
        let raw = parse_raw(&completion).map_err(|e| PipelineError::Provider(e.to_string()))?;
        Ok(validate(raw, text))
    }
}

fn build_prompt(text: &str) -> String {
    let excerpt: String = text.chars().take(PROMPT_CHAR_BUDGET).collect();
    format!(
        "Analyze the following document and respond with a single JSON object, \
         no prose, using exactly this shape:\n\
         {{\n\
           \"summary\": {{\"short\": \"...\", \"medium\": \"...\", \"detailed\": \"...\"}},\n\
           \"sentiment\": {{\"score\": -1.0..1.0, \"label\": \"positive|negative|neutral\", \"confidence\": 0.0..1.0}},\n\
           \"keywords\": [\"...\"],\n\
           \"topics\": [\"...\"],\n\
           \"entities\": [{{\"text\": \"...\", \"label\": \"PERSON|ORG|LOCATION|DATE|MISC\", \"confidence\": 0.0..1.0, \"start\": 0, \"end\": 0}}]\n\
         }}\n\
         Keywords: at most 10, most important first. Topics: at most 5. \
         Entities: at most 10 with character offsets into the document.\n\n\
         Document:\n{}",
        excerpt
    )
}

/// Stage 1: permissive decode. Tolerates markdown code fences and prose
/// around the JSON object.
pub fn parse_raw(completion: &str) -> anyhow::Result<RawAnalysis> {
    let trimmed = completion.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(raw) = serde_json::from_str::<RawAnalysis>(stripped) {
        return Ok(raw);
    }

    // Last resort: the outermost object embedded in surrounding prose.
    let start = stripped.find('{');
    let end = stripped.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            Ok(serde_json::from_str::<RawAnalysis>(&stripped[start..=end])?)
        }
        _ => anyhow::bail!("completion contains no JSON object"),
    }
}

/// Stage 2: strict validation and defaulting into the canonical shape.
/// Word count, reading time, and complexity always come from the source
/// text, never from the model.
pub fn validate(raw: RawAnalysis, text: &str) -> DocumentAnalysis {
    let words = word_count(text);

    let summary = SummarySet {
        short: clamp_summary(raw.summary.short, SUMMARY_SHORT_MAX),
        medium: clamp_summary(raw.summary.medium, SUMMARY_MEDIUM_MAX),
        detailed: clamp_summary(raw.summary.detailed, SUMMARY_DETAILED_MAX),
    };

    let sentiment = Sentiment {
        score: raw.sentiment.score.unwrap_or(0.0).clamp(-1.0, 1.0),
        label: raw
            .sentiment
            .label
            .as_deref()
            .map(SentimentLabel::parse)
            .unwrap_or(SentimentLabel::Neutral),
        confidence: raw.sentiment.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
    };

    let keywords = string_items(raw.keywords, MAX_KEYWORDS);
    let topics = string_items(raw.topics, MAX_TOPICS);

    let entities: Vec<Entity> = raw
        .entities
        .into_iter()
        .filter_map(|raw_entity| {
            let text = raw_entity.text?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let (start, end) = normalize_offsets(
                raw_entity.start.unwrap_or(0),
                raw_entity.end.unwrap_or(0),
            );
            Some(Entity {
                text,
                label: raw_entity
                    .label
                    .as_deref()
                    .map(EntityLabel::parse)
                    .unwrap_or(EntityLabel::Misc),
                confidence: raw_entity.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                start,
                end,
            })
        })
        .take(MAX_ENTITIES)
        .collect();

    DocumentAnalysis {
        summary,
        sentiment,
        keywords,
        topics,
        entities,
        word_count: words,
        reading_time: reading_time_minutes(words),
        complexity: Complexity::from_word_count(words),
        embedding: None,
    }
}

fn clamp_summary(value: Option<String>, cap: usize) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s.chars().take(cap).collect(),
        _ => "Summary not available".to_string(),
    }
}

/// Keep string items in source order (no re-ranking), prefix-truncated.
fn string_items(values: Vec<serde_json::Value>, cap: usize) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| value.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .take(cap)
        .collect()
}

fn normalize_offsets(start: usize, end: usize) -> (usize, usize) {
    if start <= end {
        (start, end)
    } else {
        (end, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    struct FixedProvider(String);

    #[async_trait]
    impl InferenceProvider for FixedProvider {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl InferenceProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            bail!("429 rate limited")
        }
    }

    #[test]
    fn empty_raw_yields_defaults() {
        let analysis = validate(RawAnalysis::default(), "one two three");
        assert_eq!(analysis.summary.short, "Summary not available");
        assert_eq!(analysis.summary.detailed, "Summary not available");
        assert_eq!(analysis.sentiment.score, 0.0);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Neutral);
        assert!((analysis.sentiment.confidence - 0.5).abs() < 1e-9);
        assert!(analysis.keywords.is_empty());
        assert!(analysis.topics.is_empty());
        assert!(analysis.entities.is_empty());
        assert_eq!(analysis.word_count, 3);
        assert_eq!(analysis.reading_time, 1);
    }

    #[test]
    fn lists_are_prefix_truncated() {
        let json = serde_json::json!({
            "keywords": (0..15).map(|i| format!("kw{}", i)).collect::<Vec<_>>(),
            "topics": (0..8).map(|i| format!("topic{}", i)).collect::<Vec<_>>(),
        });
        let raw: RawAnalysis = serde_json::from_value(json).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.keywords.len(), MAX_KEYWORDS);
        assert_eq!(analysis.keywords[0], "kw0");
        assert_eq!(analysis.keywords[9], "kw9");
        assert_eq!(analysis.topics.len(), MAX_TOPICS);
        assert_eq!(analysis.topics[4], "topic4");
    }

    #[test]
    fn off_type_list_items_are_skipped() {
        let json = serde_json::json!({ "keywords": ["alpha", 42, null, "beta"] });
        let raw: RawAnalysis = serde_json::from_value(json).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.keywords, vec!["alpha", "beta"]);
    }

    #[test]
    fn out_of_range_sentiment_is_clamped() {
        let json = serde_json::json!({
            "sentiment": { "score": 3.5, "label": "positive", "confidence": -2.0 }
        });
        let raw: RawAnalysis = serde_json::from_value(json).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.sentiment.score, 1.0);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Positive);
        assert_eq!(analysis.sentiment.confidence, 0.0);
    }

    #[test]
    fn entity_defaults_and_offset_normalization() {
        let json = serde_json::json!({
            "entities": [
                { "text": "Acme Corp", "label": "COMPANY", "start": 30, "end": 10 },
                { "label": "PERSON" },
                { "text": "  " }
            ]
        });
        let raw: RawAnalysis = serde_json::from_value(json).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.entities.len(), 1);
        let entity = &analysis.entities[0];
        assert_eq!(entity.label, EntityLabel::Misc);
        assert_eq!((entity.start, entity.end), (10, 30));
        assert!((entity.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn parse_raw_strips_code_fences() {
        let completion = "```json\n{\"keywords\": [\"alpha\"]}\n```";
        let raw = parse_raw(completion).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.keywords, vec!["alpha"]);
    }

    #[test]
    fn parse_raw_finds_embedded_object() {
        let completion = "Here is the analysis you asked for:\n{\"topics\": [\"rust\"]}\nHope it helps!";
        let raw = parse_raw(completion).unwrap();
        let analysis = validate(raw, "text");
        assert_eq!(analysis.topics, vec!["rust"]);
    }

    #[test]
    fn parse_raw_rejects_non_json() {
        assert!(parse_raw("I cannot analyze this document.").is_err());
    }

    #[tokio::test]
    async fn valid_remote_response_is_used() {
        let response = serde_json::json!({
            "summary": { "short": "s", "medium": "m", "detailed": "d" },
            "sentiment": { "score": 0.4, "label": "positive", "confidence": 0.9 },
            "keywords": ["remote"],
            "topics": ["remote-topic"],
            "entities": []
        })
        .to_string();
        let engine = AnalysisEngine::new(Arc::new(FixedProvider(response)));
        let analysis = engine.analyze("hello world hello", Some("a.txt")).await;
        assert_eq!(analysis.keywords, vec!["remote"]);
        assert_eq!(analysis.summary.short, "s");
        assert_eq!(analysis.word_count, 3);
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_simulated() {
        let engine = AnalysisEngine::new(Arc::new(FailingProvider));
        let text = "wonderful wonderful product launch";
        let analysis = engine.analyze(text, Some("launch.txt")).await;
        let expected = SimulatedAnalyzer::new().analyze(text, Some("launch.txt"));
        assert_eq!(analysis, expected);
    }

    #[tokio::test]
    async fn garbage_response_falls_back_to_simulated() {
        let engine = AnalysisEngine::new(Arc::new(FixedProvider("not json at all".into())));
        let text = "plain text with terms";
        let analysis = engine.analyze(text, None).await;
        let expected = SimulatedAnalyzer::new().analyze(text, None);
        assert_eq!(analysis, expected);
    }
}
