//! Document similarity: cosine over embeddings and word-overlap comparison.
//!
//! Two deliberately different metrics live here:
//! - [`cosine_similarity`] ranks documents by embedding vectors and backs
//!   the nearest-neighbor query.
//! - [`compare_documents`] is a cheap, explainable word-overlap (Jaccard)
//!   comparison that works without embeddings.

use anyhow::{bail, Result};
use sqlx::Row;
use std::collections::BTreeSet;

use crate::config::Config;
use crate::db;
use crate::embedding::blob_to_vec;
use crate::models::DocumentComparison;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Returns `0.0` — not an error — for
/// empty vectors, vectors of different lengths, or a zero-norm vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Word-overlap comparison: Jaccard similarity over whitespace-tokenized
/// lowercase word sets, plus a templated difference summary.
pub fn compare_documents(text_a: &str, text_b: &str) -> DocumentComparison {
    let words_a: BTreeSet<String> = text_a
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    let words_b: BTreeSet<String> = text_b
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    let intersection: Vec<String> = words_a.intersection(&words_b).cloned().collect();
    let union_len = words_a.union(&words_b).count();

    let similarity = if union_len == 0 {
        0.0
    } else {
        intersection.len() as f64 / union_len as f64
    };

    let only_in_first = words_a.difference(&words_b).count();
    let only_in_second = words_b.difference(&words_a).count();

    let summary = format!(
        "The documents share {} of {} distinct terms (Jaccard similarity {:.2}). \
         {} terms appear only in the first document and {} only in the second.",
        intersection.len(),
        union_len,
        similarity,
        only_in_first,
        only_in_second
    );

    DocumentComparison {
        similarity,
        shared_terms: intersection.into_iter().take(10).collect(),
        only_in_first,
        only_in_second,
        summary,
    }
}

/// A neighbor returned by [`find_similar`].
#[derive(Debug, Clone)]
pub struct SimilarDocument {
    pub id: String,
    pub file_name: String,
    pub score: f32,
}

/// Brute-force nearest neighbors by cosine similarity over stored document
/// embeddings. Documents without an embedding are skipped.
pub async fn find_similar(
    pool: &sqlx::SqlitePool,
    document_id: &str,
    limit: usize,
) -> Result<Vec<SimilarDocument>> {
    let target: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT embedding FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(pool)
            .await?
            .flatten();

    let target = match target {
        Some(blob) => blob_to_vec(&blob),
        None => bail!("document {} has no embedding", document_id),
    };

    let rows = sqlx::query(
        "SELECT id, file_name, embedding FROM documents WHERE id != ? AND embedding IS NOT NULL",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    let mut neighbors: Vec<SimilarDocument> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            SimilarDocument {
                id: row.get("id"),
                file_name: row.get("file_name"),
                score: cosine_similarity(&target, &blob_to_vec(&blob)),
            }
        })
        .collect();

    neighbors.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    neighbors.truncate(limit);
    Ok(neighbors)
}

/// `pulse compare` — word-overlap comparison between two stored documents.
pub async fn run_compare(config: &Config, id_a: &str, id_b: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    let body_a = fetch_body(&pool, id_a).await?;
    let body_b = fetch_body(&pool, id_b).await?;
    let comparison = compare_documents(&body_a, &body_b);

    println!("compare {} {}", id_a, id_b);
    println!("  similarity: {:.3}", comparison.similarity);
    if !comparison.shared_terms.is_empty() {
        println!("  shared terms: {}", comparison.shared_terms.join(", "));
    }
    println!("  {}", comparison.summary);

    pool.close().await;
    Ok(())
}

/// `pulse similar` — embedding nearest neighbors for a stored document.
pub async fn run_similar(config: &Config, id: &str, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;

    let neighbors = find_similar(&pool, id, limit).await?;
    if neighbors.is_empty() {
        println!("No similar documents.");
    } else {
        println!("similar to {}", id);
        for neighbor in neighbors {
            println!("  {:.3}  {}  {}", neighbor.score, neighbor.id, neighbor.file_name);
        }
    }

    pool.close().await;
    Ok(())
}

async fn fetch_body(pool: &sqlx::SqlitePool, id: &str) -> Result<String> {
    let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    body.ok_or_else(|| anyhow::anyhow!("No document with id {}", id))
}
