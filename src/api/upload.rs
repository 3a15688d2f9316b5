//! Image uploads
//!
//! Profile pictures arrive as multipart form data with a single `file`
//! field. The file is checked against the upload config, stored under a
//! fresh uuid name and served back from `/uploads/`.
//!
//! The upload route runs without axum's default body limit, so
//! `upload.max_file_size` is enforced here while the field streams in.

use axum::extract::Multipart;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::ApiError;
use crate::config::UploadConfig;

/// URL prefix the upload directory is served under
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// A stored upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Store the `file` field of `multipart`
pub async fn store_image(
    config: &UploadConfig,
    mut multipart: Multipart,
) -> Result<UploadResponse, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::field(
                "file",
                format!(
                    "Invalid file type: {}. Allowed types: {}",
                    content_type,
                    config.allowed_types.join(", ")
                ),
            ));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?
        {
            if (data.len() + chunk.len()) as u64 > config.max_file_size {
                return Err(too_large(config));
            }
            data.extend_from_slice(&chunk);
        }
        check_size(config, data.len() as u64)?;

        ensure_upload_dir(&config.path).await?;
        let filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(&content_type));
        fs::write(config.path.join(&filename), &data)
            .await
            .map_err(|e| {
                tracing::error!("Failed to save upload {}: {}", filename, e);
                ApiError::internal_error("Failed to save file")
            })?;

        tracing::info!(size = data.len(), "Stored upload {}", filename);
        return Ok(UploadResponse {
            url: format!("{}/{}", UPLOAD_URL_PREFIX, filename),
            filename,
            size: data.len() as u64,
            content_type,
        });
    }

    Err(ApiError::field("file", "No file was submitted."))
}

fn check_size(config: &UploadConfig, size: u64) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::field("file", "The submitted file is empty."));
    }
    if size > config.max_file_size {
        return Err(too_large(config));
    }
    Ok(())
}

fn too_large(config: &UploadConfig) -> ApiError {
    ApiError::field(
        "file",
        format!(
            "File too large. Maximum size: {} bytes ({} MB)",
            config.max_file_size,
            config.max_file_size / 1024 / 1024
        ),
    )
}

async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    if !path.exists() {
        fs::create_dir_all(path).await.map_err(|e| {
            tracing::error!("Failed to create upload directory {:?}: {}", path, e);
            ApiError::internal_error("Failed to create upload directory")
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_size() {
        let config = UploadConfig::default();
        assert!(check_size(&config, 1024).is_ok());
        assert!(check_size(&config, 0).is_err());
        assert!(check_size(&config, config.max_file_size + 1).is_err());
    }

    #[tokio::test]
    async fn test_ensure_upload_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b");
        ensure_upload_dir(&path).await.unwrap();
        assert!(path.is_dir());
    }
}
