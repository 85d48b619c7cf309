//! S3 object storage and multipart upload handling.

use std::collections::HashMap;

use axum::extract::Multipart;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed multipart form: at most one file plus any text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require_file(self) -> Result<UploadedFile, AppError> {
        self.file
            .ok_or_else(|| AppError::Validation("a `file` part is required".to_string()))
    }
}

/// Reads a multipart body. The `file` part must not exceed `max_bytes`.
pub async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
            if bytes.len() > max_bytes {
                return Err(AppError::Validation(format!(
                    "file exceeds the {max_bytes} byte upload limit"
                )));
            }
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("failed to read field `{name}`: {e}")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

pub async fn put_object(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("upload of {key} failed: {e}")))?;

    info!("Uploaded s3://{bucket}/{key}");
    Ok(())
}

/// Removes an object that no database row will reference. Failures are logged.
pub async fn discard_object(s3: &aws_sdk_s3::Client, bucket: &str, key: &str) {
    match s3.delete_object().bucket(bucket).key(key).send().await {
        Ok(_) => info!("Discarded orphaned s3://{bucket}/{key}"),
        Err(e) => warn!("Failed to discard orphaned s3://{bucket}/{key}: {e}"),
    }
}

pub async fn get_object_text(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<String, AppError> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("download of {key} failed: {e}")))?;
    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::Storage(format!("reading {key} failed: {e}")))?;
    Ok(String::from_utf8_lossy(&data.into_bytes()).into_owned())
}

/// Keeps letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn resume_key(candidate_id: Uuid, file_name: &str) -> String {
    format!(
        "resumes/{candidate_id}/{}-{}",
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

pub fn onboarding_key(application_id: Uuid, doc_type: &str, file_name: &str) -> String {
    format!(
        "onboarding/{application_id}/{doc_type}/{}-{}",
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

pub fn offer_letter_key(application_id: Uuid, offer_id: Uuid) -> String {
    format!("offers/{application_id}/{offer_id}.md")
}

pub fn content_type_or_default(file: &UploadedFile) -> &str {
    file.content_type
        .as_deref()
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\ana\\My CV (final).pdf"), "My_CV__final_.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_keys_are_namespaced() {
        let candidate = Uuid::new_v4();
        let key = resume_key(candidate, "cv.pdf");
        assert!(key.starts_with(&format!("resumes/{candidate}/")));
        assert!(key.ends_with("-cv.pdf"));

        let app = Uuid::new_v4();
        let offer = Uuid::new_v4();
        assert_eq!(offer_letter_key(app, offer), format!("offers/{app}/{offer}.md"));

        let doc = onboarding_key(app, "id_proof", "passport.png");
        assert!(doc.starts_with(&format!("onboarding/{app}/id_proof/")));
    }

    #[test]
    fn test_blank_fields_read_as_missing() {
        let mut form = UploadForm::default();
        form.fields.insert("cover_letter".into(), "   ".into());
        form.fields.insert("note".into(), "hello".into());
        assert_eq!(form.field("cover_letter"), None);
        assert_eq!(form.field("note"), Some("hello"));
        assert!(form.require_file().is_err());
    }
}
