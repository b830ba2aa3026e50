//! Core data models used throughout docpulse.
//!
//! These types represent the documents, analyses, and topic trend state that
//! flow through the processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of keywords kept on an analysis.
pub const MAX_KEYWORDS: usize = 10;
/// Maximum number of topics kept on an analysis.
pub const MAX_TOPICS: usize = 5;
/// Maximum number of entities kept on an analysis.
pub const MAX_ENTITIES: usize = 10;
/// Maximum number of keywords accumulated on a topic.
pub const MAX_TOPIC_KEYWORDS: usize = 20;
/// Maximum number of key quotes on a timeline entry.
pub const MAX_KEY_QUOTES: usize = 10;
/// Maximum length of a timeline entry's content, in characters.
pub const MAX_ENTRY_CONTENT: usize = 1000;

/// Character caps for the three summary lengths.
pub const SUMMARY_SHORT_MAX: usize = 500;
pub const SUMMARY_MEDIUM_MAX: usize = 1500;
pub const SUMMARY_DETAILED_MAX: usize = 5000;

/// Lifecycle stage of a document's analysis.
///
/// A document owns exactly one status; transitions are performed only by the
/// pipeline's conditional updates (see [`crate::store`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Status as stored in the SQLite TEXT column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Parse a stored status string. Unknown values map to `Failed` so a
    /// corrupted row surfaces as something an operator can re-trigger.
    pub fn parse(s: &str) -> ProcessingStatus {
        match s {
            "pending" => ProcessingStatus::Pending,
            "processing" => ProcessingStatus::Processing,
            "completed" => ProcessingStatus::Completed,
            _ => ProcessingStatus::Failed,
        }
    }

    /// Progress projection for status polling: pending=0, processing=50,
    /// completed=100, failed=0.
    pub fn progress(&self) -> u8 {
        match self {
            ProcessingStatus::Pending => 0,
            ProcessingStatus::Processing => 50,
            ProcessingStatus::Completed => 100,
            ProcessingStatus::Failed => 0,
        }
    }
}

/// Sentiment polarity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> SentimentLabel {
        match s {
            "positive" => SentimentLabel::Positive,
            "negative" => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

/// Sentiment of a document: score in [-1, 1], label, confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
    pub confidence: f64,
}

/// Named entity type. Values outside this enumeration decode as `Misc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityLabel {
    Person,
    Org,
    Location,
    Date,
    Misc,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Org => "ORG",
            EntityLabel::Location => "LOCATION",
            EntityLabel::Date => "DATE",
            EntityLabel::Misc => "MISC",
        }
    }

    pub fn parse(s: &str) -> EntityLabel {
        match s.to_ascii_uppercase().as_str() {
            "PERSON" => EntityLabel::Person,
            "ORG" | "ORGANIZATION" => EntityLabel::Org,
            "LOCATION" | "GPE" | "PLACE" => EntityLabel::Location,
            "DATE" | "TIME" => EntityLabel::Date,
            _ => EntityLabel::Misc,
        }
    }
}

/// A named entity mention with character offsets into the source text.
/// Invariant: `start <= end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

/// Coarse complexity class derived from word count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }

    pub fn parse(s: &str) -> Complexity {
        match s {
            "complex" => Complexity::Complex,
            "moderate" => Complexity::Moderate,
            _ => Complexity::Simple,
        }
    }

    /// Classify by word count: >1000 complex, >300 moderate, else simple.
    pub fn from_word_count(word_count: u64) -> Complexity {
        if word_count > 1000 {
            Complexity::Complex
        } else if word_count > 300 {
            Complexity::Moderate
        } else {
            Complexity::Simple
        }
    }
}

/// Summaries at three lengths. Caps: short 500 chars, medium 1500,
/// detailed 5000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySet {
    pub short: String,
    pub medium: String,
    pub detailed: String,
}

/// Structured analysis of a document. Always fully populated — the engine
/// fills every field either from the inference provider or from defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub summary: SummarySet,
    pub sentiment: Sentiment,
    /// Ordered, at most [`MAX_KEYWORDS`].
    pub keywords: Vec<String>,
    /// Ordered, at most [`MAX_TOPICS`].
    pub topics: Vec<String>,
    /// At most [`MAX_ENTITIES`].
    pub entities: Vec<Entity>,
    pub word_count: u64,
    /// Minutes, `ceil(word_count / 200)`.
    pub reading_time: u32,
    pub complexity: Complexity,
    /// Invariant: if present, length is exactly [`crate::embedding::DIMS`].
    pub embedding: Option<Vec<f32>>,
}

/// Word count and the canonical reading-time formula, `ceil(words / 200)`.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

pub fn reading_time_minutes(word_count: u64) -> u32 {
    word_count.div_ceil(200) as u32
}

/// A document record as stored in SQLite.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub body: String,
    pub dedup_hash: String,
    pub status: ProcessingStatus,
    /// Failure message recorded when status is `failed`.
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Populated once processing reaches `completed`.
    pub analysis: Option<DocumentAnalysis>,
}

/// One entry in a topic's timeline. The entry references its document, it
/// does not own it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTimelineEntry {
    pub document_id: String,
    pub date: DateTime<Utc>,
    /// At most [`MAX_ENTRY_CONTENT`] characters.
    pub content: String,
    /// In [0, 1].
    pub relevance_score: f64,
    /// In [-1, 1].
    pub sentiment: f64,
    /// At most [`MAX_KEY_QUOTES`].
    pub key_quotes: Vec<String>,
}

/// Derived trend metrics, recomputed on every timeline insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendData {
    /// Timeline length.
    pub frequency: usize,
    /// Sentiment values of the 10 most recent entries, newest first.
    pub sentiment_trend: Vec<f64>,
    /// In [0, 100].
    pub popularity_score: u32,
}

/// Cross-document aggregate state for one topic name. Unique per owner.
/// Never deleted, only deactivated.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// At most [`MAX_TOPIC_KEYWORDS`].
    pub keywords: Vec<String>,
    /// References to documents that mentioned this topic (set semantics).
    pub document_ids: Vec<String>,
    /// Ordered newest first.
    pub timeline: Vec<TopicTimelineEntry>,
    pub trend: TrendData,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of the word-overlap comparison between two texts.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentComparison {
    /// Jaccard similarity in [0, 1].
    pub similarity: f64,
    /// Shared terms, alphabetical, at most 10.
    pub shared_terms: Vec<String>,
    pub only_in_first: usize,
    pub only_in_second: usize,
    pub summary: String,
}
