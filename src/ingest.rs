//! Document ingestion: file → pending record → background analysis.
//!
//! The `add` flow reads a file, extracts its text (substituting a
//! placeholder on extraction failure — ingestion never aborts for that),
//! inserts a `pending` document, and hands the id to the pipeline.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::extract;
use crate::pipeline::{self, PipelineContext};
use crate::store::{self, NewDocument};

pub async fn run_add(
    config: &Config,
    path: &Path,
    content_type: Option<String>,
    owner_id: &str,
    no_wait: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;

    let content_type =
        content_type.unwrap_or_else(|| extract::content_type_for_extension(&file_name).to_string());

    // Extraction failure is surfaced but not fatal: the document proceeds
    // with an explanatory placeholder body.
    let (body, extracted) = match extract::extract_text(&bytes, &content_type) {
        Ok(text) => (text, true),
        Err(e) => {
            warn!(file = %file_name, error = %e, "extraction failed, storing placeholder");
            (extract::placeholder_text(&file_name, &e), false)
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(body.as_bytes());
    let dedup_hash = format!("{:x}", hasher.finalize());

    let doc = NewDocument {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        file_name: file_name.clone(),
        content_type,
        body,
        dedup_hash,
    };
    store::insert_document(&pool, &doc).await?;

    let ctx = Arc::new(PipelineContext::from_config(pool.clone(), config)?);
    let handle = pipeline::start_processing(ctx, &doc.id).await?;

    println!("add {}", file_name);
    println!("  document: {}", doc.id);
    if !extracted {
        println!("  extraction failed, stored with placeholder text");
    }

    match handle {
        Some(handle) if !no_wait => {
            handle.await?;
            let stored = store::get_document(&pool, &doc.id).await?;
            if let Some(stored) = stored {
                println!("  status: {}", stored.status.as_str());
                if let Some(analysis) = &stored.analysis {
                    println!("  topics: {}", analysis.topics.join(", "));
                }
            }
        }
        Some(_) => {
            println!("  status: processing (detached)");
        }
        None => {
            println!("  status: already claimed");
        }
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
