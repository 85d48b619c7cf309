//! Plain-text extraction from uploaded resumes.

use thiserror::Error;

use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported resume format '{0}'; upload a PDF or plain-text file")]
    UnsupportedFormat(String),

    #[error("uploaded file is empty")]
    Empty,

    #[error("could not read PDF: {0}")]
    Pdf(String),
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        AppError::UnprocessableEntity(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Text,
}

fn detect_format(file_name: &str, content_type: Option<&str>) -> Option<Format> {
    let content_type = content_type
        .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase());
    match content_type.as_deref() {
        Some("application/pdf") => return Some(Format::Pdf),
        Some("text/plain") | Some("text/markdown") => return Some(Format::Text),
        _ => {}
    }
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => Some(Format::Pdf),
        Some("txt") | Some("md") => Some(Format::Text),
        _ => None,
    }
}

/// Extracts text from a PDF or plain-text upload.
/// PDF parsing is CPU-bound and runs on the blocking pool.
pub async fn extract_text(
    file_name: &str,
    content_type: Option<&str>,
    bytes: bytes::Bytes,
) -> Result<String, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }
    match detect_format(file_name, content_type) {
        Some(Format::Text) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Some(Format::Pdf) => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Pdf(e.to_string()))?,
        None => Err(ExtractError::UnsupportedFormat(
            content_type.unwrap_or(file_name).to_string(),
        )),
    }
}
