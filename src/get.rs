//! Document inspection commands: status polling and full retrieval.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store;

/// `pulse status` — lifecycle status plus the progress projection used by
/// polling clients.
pub async fn run_status(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    match store::get_document(&pool, id).await? {
        Some(doc) => {
            println!("status {}", id);
            println!("  state: {}", doc.status.as_str());
            println!("  progress: {}%", doc.status.progress());
            if let Some(error) = &doc.error {
                println!("  error: {}", error);
            }
        }
        None => println!("No document with id {}", id),
    }

    pool.close().await;
    Ok(())
}

/// `pulse show` — the full record including analysis, if populated.
pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    let doc = match store::get_document(&pool, id).await? {
        Some(doc) => doc,
        None => {
            println!("No document with id {}", id);
            pool.close().await;
            return Ok(());
        }
    };

    println!("document {}", doc.id);
    println!("  file: {} ({})", doc.file_name, doc.content_type);
    println!("  owner: {}", doc.owner_id);
    println!("  state: {}", doc.status.as_str());

    match &doc.analysis {
        Some(analysis) => {
            println!("  words: {}  reading time: {} min  complexity: {}",
                analysis.word_count,
                analysis.reading_time,
                analysis.complexity.as_str()
            );
            println!(
                "  sentiment: {} ({:.2}, confidence {:.2})",
                analysis.sentiment.label.as_str(),
                analysis.sentiment.score,
                analysis.sentiment.confidence
            );
            if !analysis.keywords.is_empty() {
                println!("  keywords: {}", analysis.keywords.join(", "));
            }
            if !analysis.topics.is_empty() {
                println!("  topics: {}", analysis.topics.join(", "));
            }
            for entity in &analysis.entities {
                println!(
                    "  entity: {} [{}] ({:.2})",
                    entity.text,
                    entity.label.as_str(),
                    entity.confidence
                );
            }
            println!("  summary: {}", analysis.summary.short);
            println!(
                "  embedding: {}",
                if analysis.embedding.is_some() {
                    "stored"
                } else {
                    "absent"
                }
            );
        }
        None => println!("  analysis: not available"),
    }

    pool.close().await;
    Ok(())
}
