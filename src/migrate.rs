use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Documents: one row per uploaded document. Analysis columns stay NULL
    // until processing reaches 'completed'.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'text/plain',
            body TEXT NOT NULL,
            dedup_hash TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            summary_short TEXT,
            summary_medium TEXT,
            summary_detailed TEXT,
            sentiment_score REAL,
            sentiment_label TEXT,
            sentiment_confidence REAL,
            keywords_json TEXT,
            topics_json TEXT,
            entities_json TEXT,
            word_count INTEGER,
            reading_time INTEGER,
            complexity TEXT,
            embedding BLOB,
            analyzed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Topics: cross-document aggregate state, unique per (owner, name).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            keywords_json TEXT NOT NULL DEFAULT '[]',
            document_ids_json TEXT NOT NULL DEFAULT '[]',
            frequency INTEGER NOT NULL DEFAULT 0,
            sentiment_trend_json TEXT NOT NULL DEFAULT '[]',
            popularity INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(owner_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Timeline entries. The AUTOINCREMENT id doubles as the insertion
    // sequence, which keeps ordering stable among equal dates.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topic_timeline (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            date INTEGER NOT NULL,
            content TEXT NOT NULL,
            relevance REAL NOT NULL,
            sentiment REAL NOT NULL,
            key_quotes_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_timeline_topic_date ON topic_timeline(topic_id, date DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_topics_owner ON topics(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}
