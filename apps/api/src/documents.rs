//! PDF text extraction for uploaded resumes.
//!
//! Parsing is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub const MAX_PDF_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_EXTRACTED_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File size exceeds maximum of {}MB (got {size} bytes)", MAX_PDF_BYTES / 1024 / 1024)]
    TooLarge { size: usize },

    #[error("PDF parsing failed: {0}")]
    Unreadable(String),

    #[error("PDF appears to be empty or unreadable ({chars} characters extracted)")]
    TooLittleText { chars: usize },

    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

/// Extracts and normalizes the text of a PDF held in memory.
pub async fn extract_pdf_text(data: Bytes) -> Result<String, DocumentError> {
    if data.len() > MAX_PDF_BYTES {
        return Err(DocumentError::TooLarge { size: data.len() });
    }

    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await?
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?;

    let text = normalize_whitespace(&raw);
    let chars = text.chars().count();
    debug!("Extracted {chars} characters from PDF");

    if chars < MIN_EXTRACTED_CHARS {
        return Err(DocumentError::TooLittleText { chars });
    }
    Ok(text)
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  Jane Doe\n\n\nSenior   Engineer\t\tRust  "),
            "Jane Doe Senior Engineer Rust"
        );
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_before_parsing() {
        let data = Bytes::from(vec![0u8; MAX_PDF_BYTES + 1]);
        let err = extract_pdf_text(data).await.unwrap_err();
        assert!(matches!(err, DocumentError::TooLarge { size } if size == MAX_PDF_BYTES + 1));
    }

    #[tokio::test]
    async fn test_non_pdf_bytes_are_unreadable() {
        let err = extract_pdf_text(Bytes::from_static(b"definitely not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Unreadable(_) | DocumentError::Task(_)
        ));
    }
}
