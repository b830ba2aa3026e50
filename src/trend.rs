//! Topic trend tracking.
//!
//! Every completed document appends one timeline entry per discovered topic.
//! [`add_entry`] runs the whole read-modify-write inside a transaction so
//! two documents discovering the same topic concurrently cannot lose
//! updates, and the `UNIQUE(owner_id, name)` constraint guarantees a second
//! mention lands on the existing topic row instead of creating a new one.
//!
//! The trend math lives in [`recompute_trend`] as a pure function over the
//! sorted timeline:
//! - `frequency` — timeline length
//! - `sentiment_trend` — sentiments of the 10 most recent entries
//! - `popularity_score` — `round(min(2·len, 50) + (recent5_avg + 1)·25)`,
//!   naturally bounded to [0, 100]

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::models::{
    Topic, TopicTimelineEntry, TrendData, MAX_ENTRY_CONTENT, MAX_KEY_QUOTES, MAX_TOPIC_KEYWORDS,
};

/// Number of most-recent entries feeding `sentiment_trend`.
const TREND_WINDOW: usize = 10;
/// Number of most-recent entries feeding the popularity average.
const POPULARITY_WINDOW: usize = 5;

/// Recompute trend metrics from a timeline sorted newest first.
pub fn recompute_trend(timeline: &[TopicTimelineEntry]) -> TrendData {
    let frequency = timeline.len();

    let sentiment_trend: Vec<f64> = timeline
        .iter()
        .take(TREND_WINDOW)
        .map(|entry| entry.sentiment)
        .collect();

    let recent: Vec<f64> = timeline
        .iter()
        .take(POPULARITY_WINDOW)
        .map(|entry| entry.sentiment)
        .collect();
    let avg_sentiment = if recent.is_empty() {
        0.0
    } else {
        recent.iter().sum::<f64>() / recent.len() as f64
    };

    let activity_score = (frequency * 2).min(50) as f64;
    let sentiment_score = (avg_sentiment + 1.0) * 25.0;
    let popularity_score = (activity_score + sentiment_score).round().clamp(0.0, 100.0) as u32;

    TrendData {
        frequency,
        sentiment_trend,
        popularity_score,
    }
}

/// Sort a timeline newest first. Stable: entries with equal dates keep
/// their relative insertion order.
pub fn sort_timeline(timeline: &mut [TopicTimelineEntry]) {
    timeline.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Append a timeline entry to the named topic (creating the topic on first
/// mention) and recompute its trend state. The document's keywords are
/// merged into the topic's keyword set, capped at
/// [`MAX_TOPIC_KEYWORDS`].
pub async fn add_entry(
    pool: &SqlitePool,
    owner_id: &str,
    name: &str,
    entry: &TopicTimelineEntry,
    doc_keywords: &[String],
) -> Result<TrendData, PipelineError> {
    let mut tx = pool.begin().await?;
    let now = Utc::now().timestamp();

    // First mention creates the topic; later mentions must land on the same
    // row, so the insert defers to the UNIQUE(owner_id, name) constraint.
    sqlx::query(
        "INSERT INTO topics (id, owner_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(owner_id, name) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(owner_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let topic_row = sqlx::query(
        "SELECT id, keywords_json, document_ids_json FROM topics WHERE owner_id = ? AND name = ?",
    )
    .bind(owner_id)
    .bind(name)
    .fetch_one(&mut *tx)
    .await?;
    let topic_id: String = topic_row.get("id");

    let content: String = entry.content.chars().take(MAX_ENTRY_CONTENT).collect();
    let key_quotes: Vec<String> = entry
        .key_quotes
        .iter()
        .take(MAX_KEY_QUOTES)
        .cloned()
        .collect();

    sqlx::query(
        r#"
        INSERT INTO topic_timeline (topic_id, document_id, date, content, relevance, sentiment, key_quotes_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&topic_id)
    .bind(&entry.document_id)
    .bind(entry.date.timestamp())
    .bind(&content)
    .bind(entry.relevance_score.clamp(0.0, 1.0))
    .bind(entry.sentiment.clamp(-1.0, 1.0))
    .bind(serde_json::to_string(&key_quotes).unwrap_or_else(|_| "[]".to_string()))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // Re-read the full timeline newest first. The autoincrement id breaks
    // date ties in insertion order, matching a stable re-sort.
    let timeline = fetch_timeline(&mut tx, &topic_id).await?;
    let trend = recompute_trend(&timeline);

    let mut document_ids: Vec<String> = topic_row
        .get::<Option<String>, _>("document_ids_json")
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    if !document_ids.contains(&entry.document_id) {
        document_ids.push(entry.document_id.clone());
    }

    let mut keywords: Vec<String> = topic_row
        .get::<Option<String>, _>("keywords_json")
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    for keyword in doc_keywords {
        if keywords.len() >= MAX_TOPIC_KEYWORDS {
            break;
        }
        if !keywords.contains(keyword) {
            keywords.push(keyword.clone());
        }
    }

    sqlx::query(
        r#"
        UPDATE topics SET
            frequency = ?,
            sentiment_trend_json = ?,
            popularity = ?,
            document_ids_json = ?,
            keywords_json = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(trend.frequency as i64)
    .bind(serde_json::to_string(&trend.sentiment_trend).unwrap_or_else(|_| "[]".to_string()))
    .bind(trend.popularity_score as i64)
    .bind(serde_json::to_string(&document_ids).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(&keywords).unwrap_or_else(|_| "[]".to_string()))
    .bind(now)
    .bind(&topic_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(trend)
}

async fn fetch_timeline(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    topic_id: &str,
) -> Result<Vec<TopicTimelineEntry>, PipelineError> {
    let rows = sqlx::query(
        "SELECT document_id, date, content, relevance, sentiment, key_quotes_json \
         FROM topic_timeline WHERE topic_id = ? ORDER BY date DESC, id ASC",
    )
    .bind(topic_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.iter().map(row_to_entry).collect())
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> TopicTimelineEntry {
    TopicTimelineEntry {
        document_id: row.get("document_id"),
        date: DateTime::from_timestamp(row.get::<i64, _>("date"), 0).unwrap_or_else(Utc::now),
        content: row.get("content"),
        relevance_score: row.get("relevance"),
        sentiment: row.get("sentiment"),
        key_quotes: row
            .get::<Option<String>, _>("key_quotes_json")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
    }
}

/// Load one topic with its full timeline, newest first.
pub async fn load_topic(
    pool: &SqlitePool,
    owner_id: &str,
    name: &str,
) -> Result<Option<Topic>, PipelineError> {
    let row = sqlx::query("SELECT * FROM topics WHERE owner_id = ? AND name = ?")
        .bind(owner_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };
    let topic_id: String = row.get("id");

    let timeline_rows = sqlx::query(
        "SELECT document_id, date, content, relevance, sentiment, key_quotes_json \
         FROM topic_timeline WHERE topic_id = ? ORDER BY date DESC, id ASC",
    )
    .bind(&topic_id)
    .fetch_all(pool)
    .await?;
    let timeline: Vec<TopicTimelineEntry> = timeline_rows.iter().map(row_to_entry).collect();

    Ok(Some(Topic {
        id: topic_id,
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        keywords: row
            .get::<Option<String>, _>("keywords_json")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        document_ids: row
            .get::<Option<String>, _>("document_ids_json")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        trend: TrendData {
            frequency: row.get::<i64, _>("frequency") as usize,
            sentiment_trend: row
                .get::<Option<String>, _>("sentiment_trend_json")
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            popularity_score: row.get::<i64, _>("popularity") as u32,
        },
        timeline,
        active: row.get::<i64, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Soft-deactivate a topic. Topics are never deleted. Returns `false` when
/// no such topic exists.
pub async fn deactivate_topic(
    pool: &SqlitePool,
    owner_id: &str,
    name: &str,
) -> Result<bool, PipelineError> {
    let now = Utc::now().timestamp();
    let result =
        sqlx::query("UPDATE topics SET active = 0, updated_at = ? WHERE owner_id = ? AND name = ?")
            .bind(now)
            .bind(owner_id)
            .bind(name)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// `pulse topics` — list active topics for an owner with trend state.
pub async fn run_topics(config: &Config, owner_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    let rows = sqlx::query(
        "SELECT name, frequency, popularity, document_ids_json FROM topics \
         WHERE owner_id = ? AND active = 1 ORDER BY popularity DESC, name ASC",
    )
    .bind(owner_id)
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("No topics.");
    } else {
        println!("topics ({})", owner_id);
        for row in &rows {
            let docs: Vec<String> = row
                .get::<Option<String>, _>("document_ids_json")
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default();
            println!(
                "  {:<30} popularity {:>3}  entries {:>3}  documents {:>3}",
                row.get::<String, _>("name"),
                row.get::<i64, _>("popularity"),
                row.get::<i64, _>("frequency"),
                docs.len()
            );
        }
    }

    pool.close().await;
    Ok(())
}

/// `pulse topics deactivate` — soft-deactivate one topic.
pub async fn run_deactivate(config: &Config, owner_id: &str, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    if deactivate_topic(&pool, owner_id, name).await? {
        println!("Topic '{}' deactivated.", name);
    } else {
        println!("No topic named '{}'.", name);
    }
    pool.close().await;
    Ok(())
}
