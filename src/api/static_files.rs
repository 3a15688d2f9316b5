//! Static file serving
//!
//! - /static/{path}: stylesheet and other assets embedded from `static/`
//! - /uploads/{path}: uploaded files read from the upload directory

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;
use std::path::{Component, PathBuf};
use tokio::fs;

use crate::api::middleware::AppState;

/// Embedded site assets
#[derive(RustEmbed)]
#[folder = "static/"]
struct StaticAssets;

/// GET /static/{*path}
pub async fn serve_static(Path(path): Path<String>) -> Response {
    let decoded = urlencoding::decode(&path).map(|p| p.into_owned()).unwrap_or(path);
    match StaticAssets::get(decoded.trim_start_matches('/')) {
        Some(content) => build_response(&decoded, content.data.into_owned(), "public, max-age=3600"),
        None => not_found(),
    }
}

/// GET /uploads/{*path}
pub async fn serve_uploads(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let decoded = urlencoding::decode(&path).map(|p| p.into_owned()).unwrap_or(path);
    let Some(relative) = safe_relative_path(&decoded) else {
        return not_found();
    };
    let file_path = state.config.upload.path.join(relative);

    match fs::read(&file_path).await {
        // Upload names are fresh uuids, so the content never changes
        Ok(contents) => build_response(&decoded, contents, "public, max-age=31536000, immutable"),
        Err(_) => not_found(),
    }
}

/// `path` as a relative path with no parent or root components
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let path = PathBuf::from(path.trim_start_matches('/'));
    if path.as_os_str().is_empty() {
        return None;
    }
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

fn build_response(path: &str, data: Vec<u8>, cache_control: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, get_content_type(path)),
            (header::CACHE_CONTROL, cache_control),
        ],
        data,
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Not Found",
    )
        .into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
