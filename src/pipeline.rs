//! Background processing pipeline and document state machine.
//!
//! Uploading creates a `pending` record; [`start_processing`] claims it with
//! an atomic conditional update and runs the analysis stages in a detached
//! task, so the triggering operation returns as soon as the claim lands.
//! Stage order per document:
//!
//! ```text
//! raw text → AnalysisEngine → DocumentAnalysis → EmbeddingService
//!          → save (dimension-checked, sets completed) → topic trend updates
//! ```
//!
//! Failure handling: any stage error moves the document to `failed` with the
//! error recorded on the row; nothing propagates past the task boundary.
//! Trend updates run after the document is already `completed` — a trend
//! failure is logged and does not fail the document. There is no
//! cancellation: a claimed document always runs to `completed` or `failed`.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisEngine;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingService};
use crate::error::PipelineError;
use crate::inference;
use crate::models::{
    Document, DocumentAnalysis, ProcessingStatus, TopicTimelineEntry, MAX_ENTRY_CONTENT,
};
use crate::store;
use crate::trend;

/// Maximum length of an extracted key quote, in characters.
const KEY_QUOTE_MAX: usize = 200;
/// Key quotes extracted per timeline entry.
const KEY_QUOTE_COUNT: usize = 3;

/// Everything a background analysis task needs. Providers are injected at
/// construction so tests can substitute deterministic fakes.
pub struct PipelineContext {
    pub pool: SqlitePool,
    pub engine: AnalysisEngine,
    pub embedder: EmbeddingService,
}

impl PipelineContext {
    pub fn new(
        pool: SqlitePool,
        inference_provider: Arc<dyn inference::InferenceProvider>,
        embedding_provider: Arc<dyn embedding::EmbeddingProvider>,
    ) -> PipelineContext {
        PipelineContext {
            pool,
            engine: AnalysisEngine::new(inference_provider),
            embedder: EmbeddingService::new(embedding_provider),
        }
    }

    /// Build a context with providers resolved from configuration.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<PipelineContext> {
        let inference_provider = inference::create_provider(&config.inference)?;
        let embedding_provider = embedding::create_provider(&config.embedding)?;
        Ok(PipelineContext::new(
            pool,
            inference_provider,
            embedding_provider,
        ))
    }
}

/// Claim a pending document and spawn its analysis as a detached task.
///
/// Returns the task handle when the claim succeeded, `None` when the
/// document was not `pending` (already claimed, completed, or failed) —
/// a state conflict is a no-op to the caller. At most one in-flight task
/// per document is possible because the claim is a compare-and-swap on the
/// status column.
pub async fn start_processing(
    ctx: Arc<PipelineContext>,
    document_id: &str,
) -> Result<Option<JoinHandle<()>>, PipelineError> {
    match store::claim_for_processing(&ctx.pool, document_id).await {
        Ok(()) => {}
        Err(PipelineError::StateConflict { .. }) => {
            debug!(document = document_id, "claim refused, document not pending");
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    let id = document_id.to_string();
    let handle = tokio::spawn(async move {
        process_claimed(ctx, id).await;
    });
    Ok(Some(handle))
}

/// Runs inside the spawned task. Never returns an error: failures are
/// recorded on the document row.
async fn process_claimed(ctx: Arc<PipelineContext>, id: String) {
    match run_stages(&ctx, &id).await {
        Ok((document, analysis)) => {
            info!(
                document = %id,
                topics = analysis.topics.len(),
                "analysis completed"
            );
            update_topics(&ctx, &document, &analysis).await;
        }
        Err(e) => {
            warn!(document = %id, error = %e, "analysis failed");
            let message = e.to_string();
            if let Err(status_err) =
                store::set_status(&ctx.pool, &id, ProcessingStatus::Failed, Some(&message)).await
            {
                warn!(document = %id, error = %status_err, "failed to record failure status");
            }
        }
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    id: &str,
) -> Result<(Document, DocumentAnalysis), PipelineError> {
    let document = store::get_document(&ctx.pool, id)
        .await?
        .ok_or(PipelineError::Storage(sqlx::Error::RowNotFound))?;

    let mut analysis = ctx
        .engine
        .analyze(&document.body, Some(&document.file_name))
        .await;
    analysis.embedding = Some(ctx.embedder.embed_document(&document.body).await);

    store::save_analysis(&ctx.pool, id, &analysis).await?;
    Ok((document, analysis))
}

/// Append one timeline entry per discovered topic. Runs after the document
/// is `completed`; errors are logged, not fatal.
async fn update_topics(ctx: &PipelineContext, document: &Document, analysis: &DocumentAnalysis) {
    let now = Utc::now();

    for (rank, topic_name) in analysis.topics.iter().enumerate() {
        let entry = TopicTimelineEntry {
            document_id: document.id.clone(),
            date: now,
            content: analysis
                .summary
                .medium
                .chars()
                .take(MAX_ENTRY_CONTENT)
                .collect(),
            relevance_score: (1.0 - 0.15 * rank as f64).clamp(0.1, 1.0),
            sentiment: analysis.sentiment.score,
            key_quotes: extract_key_quotes(&document.body, topic_name),
        };

        if let Err(e) = trend::add_entry(
            &ctx.pool,
            &document.owner_id,
            topic_name,
            &entry,
            &analysis.keywords,
        )
        .await
        {
            warn!(topic = %topic_name, error = %e, "topic trend update failed");
        }
    }
}

/// Sentences of the source text that mention the topic, case-insensitive,
/// clamped in count and length.
fn extract_key_quotes(body: &str, topic: &str) -> Vec<String> {
    let needle = topic.to_lowercase();
    body.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .filter(|sentence| sentence.to_lowercase().contains(&needle))
        .take(KEY_QUOTE_COUNT)
        .map(|sentence| sentence.chars().take(KEY_QUOTE_MAX).collect())
        .collect()
}

/// `pulse reprocess` — explicit re-trigger for a failed document.
pub async fn run_reprocess(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    if !store::reset_failed(&pool, id).await? {
        let status = store::get_document(&pool, id)
            .await?
            .map(|doc| doc.status.as_str().to_string());
        match status {
            Some(status) => println!("Document {} is '{}', only failed documents can be reprocessed.", id, status),
            None => println!("No document with id {}", id),
        }
        pool.close().await;
        return Ok(());
    }

    let ctx = Arc::new(PipelineContext::from_config(pool.clone(), config)?);
    if let Some(handle) = start_processing(ctx, id).await? {
        handle.await?;
    }

    let doc = store::get_document(&pool, id).await?;
    match doc {
        Some(doc) => println!("reprocess {}\n  status: {}", id, doc.status.as_str()),
        None => println!("reprocess {}\n  document disappeared", id),
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use crate::store::NewDocument;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Counts completions and blocks each one until the gate is released.
    struct GatedProvider {
        gate: Arc<Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl inference::InferenceProvider for GatedProvider {
        fn model_name(&self) -> &str {
            "gated"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(serde_json::json!({
                "summary": { "short": "s", "medium": "m", "detailed": "d" },
                "sentiment": { "score": 0.5, "label": "positive", "confidence": 0.9 },
                "keywords": ["release"],
                "topics": ["release"],
                "entities": []
            })
            .to_string())
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl embedding::EmbeddingProvider for ZeroEmbedder {
        fn model_name(&self) -> &str {
            "zero"
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.1; embedding::DIMS])
        }
    }

    async fn test_ctx(provider: Arc<GatedProvider>) -> Arc<PipelineContext> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        Arc::new(PipelineContext::new(pool, provider, Arc::new(ZeroEmbedder)))
    }

    fn gated_provider() -> Arc<GatedProvider> {
        Arc::new(GatedProvider {
            gate: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        })
    }

    async fn insert_sample(pool: &SqlitePool, id: &str) {
        store::insert_document(
            pool,
            &NewDocument {
                id: id.to_string(),
                owner_id: "local".to_string(),
                file_name: "release-notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                body: "The release went well. The release shipped on time.".to_string(),
                dedup_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn immediate_poll_never_sees_completed() {
        let provider = gated_provider();
        let ctx = test_ctx(provider.clone()).await;
        insert_sample(&ctx.pool, "d1").await;

        let handle = start_processing(ctx.clone(), "d1").await.unwrap().unwrap();

        // The task is blocked on the gate: polling now must observe an
        // in-flight state, never completed.
        let doc = store::get_document(&ctx.pool, "d1").await.unwrap().unwrap();
        assert!(matches!(
            doc.status,
            ProcessingStatus::Pending | ProcessingStatus::Processing
        ));

        provider.gate.notify_one();
        handle.await.unwrap();

        let doc = store::get_document(&ctx.pool, "d1").await.unwrap().unwrap();
        assert_eq!(doc.status, ProcessingStatus::Completed);
        assert_eq!(doc.status.progress(), 100);
    }

    #[tokio::test]
    async fn double_start_runs_exactly_one_analysis() {
        let provider = gated_provider();
        let ctx = test_ctx(provider.clone()).await;
        insert_sample(&ctx.pool, "d1").await;

        let first = start_processing(ctx.clone(), "d1").await.unwrap();
        let second = start_processing(ctx.clone(), "d1").await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        provider.gate.notify_one();
        first.unwrap().await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completion_fans_out_to_topics() {
        let provider = gated_provider();
        let ctx = test_ctx(provider.clone()).await;
        insert_sample(&ctx.pool, "d1").await;

        provider.gate.notify_one();
        let handle = start_processing(ctx.clone(), "d1").await.unwrap().unwrap();
        handle.await.unwrap();

        let topic = trend::load_topic(&ctx.pool, "local", "release")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(topic.trend.frequency, 1);
        assert_eq!(topic.document_ids, vec!["d1"]);
        assert_eq!(topic.timeline[0].sentiment, 0.5);
        // Both sentences mention the topic.
        assert_eq!(topic.timeline[0].key_quotes.len(), 2);
    }

    #[tokio::test]
    async fn missing_document_claim_is_a_noop() {
        let provider = gated_provider();
        let ctx = test_ctx(provider).await;
        let result = start_processing(ctx, "nope").await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn key_quotes_match_topic_sentences() {
        let body = "Pricing changed last week. Nothing else happened. The pricing team agreed!";
        let quotes = extract_key_quotes(body, "Pricing");
        assert_eq!(quotes.len(), 2);
        assert!(quotes[0].starts_with("Pricing changed"));
    }

    #[test]
    fn relevance_decays_with_rank_but_stays_positive() {
        for rank in 0..5u32 {
            let relevance = (1.0 - 0.15 * rank as f64).clamp(0.1, 1.0);
            assert!((0.1..=1.0).contains(&relevance));
        }
    }
}
