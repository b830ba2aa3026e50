//! Text extraction from uploaded files.
//!
//! Extraction is treated as a declared-type capability: callers supply bytes
//! plus a content type, and this module returns plain UTF-8 text or a typed
//! error. Binary formats (PDF, OOXML, images) are handled by an external
//! extraction service upstream of this pipeline and arrive here already as
//! `text/plain`.
//!
//! An extraction failure never aborts ingestion: the ingest flow substitutes
//! [`placeholder_text`] and lets the document proceed through analysis.

use crate::error::PipelineError;

/// Content types this module can decode directly.
pub const SUPPORTED_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/csv",
    "text/html",
    "application/json",
];

/// Extract plain text from file content with a declared content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, PipelineError> {
    if !SUPPORTED_TYPES.contains(&content_type) {
        return Err(PipelineError::Extraction(format!(
            "unsupported content type: {}",
            content_type
        )));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| PipelineError::Extraction(format!("invalid UTF-8: {}", e)))?;

    if text.trim().is_empty() {
        return Err(PipelineError::Extraction("document is empty".to_string()));
    }

    Ok(text.to_string())
}

/// Guess a content type from a file extension. Unknown extensions fall back
/// to `application/octet-stream`, which [`extract_text`] rejects.
pub fn content_type_for_extension(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next().unwrap_or("") {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Explanatory text used in place of a body when extraction fails. The
/// document still flows through analysis so its record carries a summary of
/// the failure rather than nothing.
pub fn placeholder_text(file_name: &str, err: &PipelineError) -> String {
    format!(
        "No text could be extracted from the file '{}'. Reason: {}. \
         The document was stored without readable content.",
        file_name, err
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_extracted() {
        let text = extract_text(b"hello world", "text/plain").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/pdf").unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[test]
    fn invalid_utf8_returns_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], "text/plain").unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[test]
    fn empty_body_returns_error() {
        let err = extract_text(b"   \n ", "text/plain").unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[test]
    fn extension_guessing() {
        assert_eq!(content_type_for_extension("notes.md"), "text/markdown");
        assert_eq!(content_type_for_extension("report.txt"), "text/plain");
        assert_eq!(
            content_type_for_extension("scan.pdf"),
            "application/octet-stream"
        );
    }

    #[test]
    fn placeholder_mentions_file_and_reason() {
        let err = PipelineError::Extraction("unsupported content type: application/pdf".into());
        let text = placeholder_text("scan.pdf", &err);
        assert!(text.contains("scan.pdf"));
        assert!(text.contains("unsupported content type"));
    }
}
