use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::info;

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

#[derive(Debug, Error)]
pub enum PdfExtractionError {
    #[error("Invalid PDF file: {0}")]
    Invalid(String),

    #[error("No text could be extracted from PDF")]
    NoText,
}

/// Extracts and cleans the text of an uploaded PDF.
///
/// Parsing runs on the blocking pool. A panic inside the parser (malformed
/// input can trigger one) surfaces as `Invalid` instead of taking down the task.
pub async fn extract_text_from_pdf(data: Bytes) -> Result<String, PdfExtractionError> {
    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(|e| PdfExtractionError::Invalid(format!("parser aborted: {e}")))?
        .map_err(|e| PdfExtractionError::Invalid(e.to_string()))?;

    let text = clean_text(&raw);
    if text.is_empty() {
        return Err(PdfExtractionError::NoText);
    }

    info!("Extracted {} characters from PDF", text.chars().count());
    Ok(text)
}

/// Collapses runs of spaces to one space and any whitespace spanning two or more
/// line breaks to a single blank line, then trims the ends.
pub fn clean_text(text: &str) -> String {
    let text = SPACE_RUN.replace_all(text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
