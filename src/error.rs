//! Typed error taxonomy for the analysis pipeline.
//!
//! Recovery rules:
//! - `Extraction` is surfaced to the ingest flow, which substitutes a
//!   placeholder text and continues.
//! - `Provider` and `EmbeddingProvider` never escape their services; both
//!   are recovered via local fallbacks.
//! - `StateConflict` is a no-op to callers of `start_processing`.
//! - `Dimension` and `Storage` are fatal to the in-flight job: the document
//!   transitions to `failed` and the error is recorded on the row, never
//!   thrown past the background task boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("inference provider failure: {0}")]
    Provider(String),

    #[error("embedding provider failure: {0}")]
    EmbeddingProvider(String),

    #[error("document {id} is not in the '{expected}' state")]
    StateConflict { id: String, expected: &'static str },

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}
