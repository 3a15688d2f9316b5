//! Named lookups over the catalog
//!
//! Exact-name queries; an unknown name is a 404.
//!
//! - GET /api/v1/lookup/books-by-author?name=
//! - GET /api/v1/lookup/books-in-library?name=
//! - GET /api/v1/lookup/librarian?library=

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::text_opt;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::BookResponse;
use crate::models::Librarian;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    pub library: Option<String>,
}

/// Build the lookup router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books-by-author", get(books_by_author))
        .route("/books-in-library", get(books_in_library))
        .route("/librarian", get(librarian_for_library))
}

fn required(field: &str, value: &Option<String>) -> Result<String, ApiError> {
    text_opt(value).ok_or_else(|| ApiError::field(field, "This field is required."))
}

/// GET /api/v1/lookup/books-by-author?name=
async fn books_by_author(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let name = required("name", &query.name)?;
    let books = state.book_service.books_by_author(&name).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /api/v1/lookup/books-in-library?name=
async fn books_in_library(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let name = required("name", &query.name)?;
    let books = state.library_service.books_in_library(&name).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /api/v1/lookup/librarian?library=
async fn librarian_for_library(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<Librarian>, ApiError> {
    let name = required("library", &query.library)?;
    Ok(Json(state.library_service.librarian_for_library(&name).await?))
}
