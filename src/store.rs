//! Document persistence.
//!
//! All document status transitions go through this module. The
//! pending→processing transition is a conditional update keyed on the
//! current status ([`claim_for_processing`]) so that exactly one background
//! task can win a claim, and analysis persistence rejects embedding vectors
//! of the wrong dimensionality instead of storing them.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob, DIMS};
use crate::error::PipelineError;
use crate::models::{
    Document, DocumentAnalysis, Entity, ProcessingStatus, Sentiment, SentimentLabel, SummarySet,
    Complexity,
};

/// Fields needed to create a document record in the `pending` state.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub body: String,
    pub dedup_hash: String,
}

pub async fn insert_document(pool: &SqlitePool, doc: &NewDocument) -> Result<(), PipelineError> {
    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO documents (id, owner_id, file_name, content_type, body, dedup_hash, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.owner_id)
    .bind(&doc.file_name)
    .bind(&doc.content_type)
    .bind(&doc.body)
    .bind(&doc.dedup_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically claim a pending document for processing (compare-and-swap on
/// status). A document that is not in `pending` yields
/// [`PipelineError::StateConflict`]; the pipeline treats that as a no-op.
pub async fn claim_for_processing(pool: &SqlitePool, id: &str) -> Result<(), PipelineError> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE documents SET status = 'processing', error = NULL, updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(PipelineError::StateConflict {
            id: id.to_string(),
            expected: "pending",
        })
    }
}

/// Merge a complete analysis into the document and mark it `completed`, in
/// one statement. An embedding of the wrong length is rejected before
/// anything is written.
pub async fn save_analysis(
    pool: &SqlitePool,
    id: &str,
    analysis: &DocumentAnalysis,
) -> Result<(), PipelineError> {
    let embedding_blob = match &analysis.embedding {
        Some(vector) if vector.len() != DIMS => {
            return Err(PipelineError::Dimension {
                expected: DIMS,
                actual: vector.len(),
            });
        }
        Some(vector) => Some(vec_to_blob(vector)),
        None => None,
    };

    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        UPDATE documents SET
            status = 'completed',
            error = NULL,
            summary_short = ?,
            summary_medium = ?,
            summary_detailed = ?,
            sentiment_score = ?,
            sentiment_label = ?,
            sentiment_confidence = ?,
            keywords_json = ?,
            topics_json = ?,
            entities_json = ?,
            word_count = ?,
            reading_time = ?,
            complexity = ?,
            embedding = ?,
            analyzed_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&analysis.summary.short)
    .bind(&analysis.summary.medium)
    .bind(&analysis.summary.detailed)
    .bind(analysis.sentiment.score)
    .bind(analysis.sentiment.label.as_str())
    .bind(analysis.sentiment.confidence)
    .bind(serde_json::to_string(&analysis.keywords).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(&analysis.topics).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(&analysis.entities).unwrap_or_else(|_| "[]".to_string()))
    .bind(analysis.word_count as i64)
    .bind(analysis.reading_time as i64)
    .bind(analysis.complexity.as_str())
    .bind(embedding_blob)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a terminal or reset status. Analysis columns are left untouched,
/// so a failed attempt preserves whatever existed before it.
pub async fn set_status(
    pool: &SqlitePool,
    id: &str,
    status: ProcessingStatus,
    error: Option<&str>,
) -> Result<(), PipelineError> {
    let now = Utc::now().timestamp();
    sqlx::query("UPDATE documents SET status = ?, error = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Explicit re-trigger: move a `failed` document back to `pending`.
/// Returns `false` when the document is not in `failed`.
pub async fn reset_failed(pool: &SqlitePool, id: &str) -> Result<bool, PipelineError> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE documents SET status = 'pending', error = NULL, updated_at = ? \
         WHERE id = ? AND status = 'failed'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>, PipelineError> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row_to_document(&row)))
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let status = ProcessingStatus::parse(&row.get::<String, _>("status"));
    let analyzed_at: Option<i64> = row.get("analyzed_at");

    let analysis = analyzed_at.map(|_| DocumentAnalysis {
        summary: SummarySet {
            short: row.get::<Option<String>, _>("summary_short").unwrap_or_default(),
            medium: row.get::<Option<String>, _>("summary_medium").unwrap_or_default(),
            detailed: row.get::<Option<String>, _>("summary_detailed").unwrap_or_default(),
        },
        sentiment: Sentiment {
            score: row.get::<Option<f64>, _>("sentiment_score").unwrap_or(0.0),
            label: SentimentLabel::parse(
                row.get::<Option<String>, _>("sentiment_label")
                    .unwrap_or_default()
                    .as_str(),
            ),
            confidence: row
                .get::<Option<f64>, _>("sentiment_confidence")
                .unwrap_or(0.5),
        },
        keywords: json_list(row.get::<Option<String>, _>("keywords_json")),
        topics: json_list(row.get::<Option<String>, _>("topics_json")),
        entities: json_entities(row.get::<Option<String>, _>("entities_json")),
        word_count: row.get::<Option<i64>, _>("word_count").unwrap_or(0) as u64,
        reading_time: row.get::<Option<i64>, _>("reading_time").unwrap_or(0) as u32,
        complexity: Complexity::parse(
            row.get::<Option<String>, _>("complexity")
                .unwrap_or_default()
                .as_str(),
        ),
        embedding: row
            .get::<Option<Vec<u8>>, _>("embedding")
            .map(|blob| blob_to_vec(&blob)),
    });

    Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        body: row.get("body"),
        dedup_hash: row.get("dedup_hash"),
        status,
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        analysis,
    }
}

fn json_list(value: Option<String>) -> Vec<String> {
    value
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn json_entities(value: Option<String>) -> Vec<Entity> {
    value
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}
