//! Book API endpoints
//!
//! Reads are public; writes need a signed-in user.
//!
//! - GET /api/v1/books - list with filters, ordering and pagination
//! - POST /api/v1/books (alias /books/create)
//! - GET /api/v1/books/{id}
//! - PUT|PATCH /api/v1/books/{id} (alias /books/{id}/update)
//! - DELETE /api/v1/books/{id} (alias /books/{id}/delete)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{paginate, parse_opt, text_opt, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{BookResponse, DataResponse, PaginatedResponse};
use crate::models::{BookFilter, BookOrdering, UpdateBookInput};
use crate::services::book::require_all;

/// Query parameters of the book list
#[derive(Debug, Default, Deserialize)]
pub struct BookListQuery {
    #[serde(flatten)]
    pub pagination: PaginationQuery,
    /// Title or author name, case-insensitive
    pub search: Option<String>,
    pub title: Option<String>,
    /// Author id
    pub author: Option<String>,
    pub publication_year: Option<String>,
    #[serde(rename = "author__name")]
    pub author_name: Option<String>,
    pub min_year: Option<String>,
    pub max_year: Option<String>,
    pub ordering: Option<String>,
}

impl BookListQuery {
    pub fn filter(&self) -> Result<BookFilter, ApiError> {
        let ordering = match text_opt(&self.ordering) {
            None => BookOrdering::default(),
            Some(raw) => raw.parse::<BookOrdering>().map_err(|_| {
                ApiError::field(
                    "ordering",
                    "Ordering must be one of: title, -title, publication_year, -publication_year.",
                )
            })?,
        };
        Ok(BookFilter {
            search: text_opt(&self.search),
            title: text_opt(&self.title),
            author_id: parse_opt("author", &self.author, "A valid integer is required.")?,
            author_name: text_opt(&self.author_name),
            publication_year: parse_opt("publication_year", &self.publication_year, "Enter a number.")?,
            min_year: parse_opt("min_year", &self.min_year, "Enter a number.")?,
            max_year: parse_opt("max_year", &self.max_year, "Enter a number.")?,
            ordering,
        })
    }
}

/// Request body for create and update; every field optional so PATCH and
/// PUT can share it
#[derive(Debug, Default, Deserialize)]
pub struct BookRequest {
    pub title: Option<String>,
    /// Author id
    #[serde(alias = "author_id")]
    pub author: Option<i64>,
    pub publication_year: Option<i32>,
}

impl From<BookRequest> for UpdateBookInput {
    fn from(body: BookRequest) -> Self {
        Self {
            title: body.title,
            author_id: body.author,
            publication_year: body.publication_year,
        }
    }
}

/// Build the books router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/create", post(create_book))
        .route(
            "/{id}",
            get(get_book)
                .put(replace_book)
                .patch(update_book)
                .delete(delete_book),
        )
        .route("/{id}/update", axum::routing::put(replace_book).patch(update_book))
        .route("/{id}/delete", delete(delete_book))
}

/// GET /api/v1/books
async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookListQuery>,
) -> Result<Json<PaginatedResponse<BookResponse>>, ApiError> {
    let filter = query.filter()?;
    let params = query.pagination.params(&state.config.pagination)?;
    let page = state.book_service.list(&filter, &params).await?;
    Ok(Json(paginate(page.map(BookResponse::from))?))
}

/// GET /api/v1/books/{id}
async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BookResponse>, ApiError> {
    Ok(Json(state.book_service.get(id).await?.into()))
}

/// POST /api/v1/books
async fn create_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = require_all(body.into())?;
    let book = state.book_service.create(input).await?;
    tracing::debug!(user_id = user.0.id, book_id = book.id, "Book added");
    Ok((
        StatusCode::CREATED,
        DataResponse::new("Book created successfully!", BookResponse::from(book)),
    ))
}

/// PUT /api/v1/books/{id} - full replace
async fn replace_book(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let book = state.book_service.replace(id, body.into()).await?;
    Ok(DataResponse::new("Book updated successfully!", BookResponse::from(book)))
}

/// PATCH /api/v1/books/{id} - partial update
async fn update_book(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let book = state.book_service.update(id, body.into()).await?;
    Ok(DataResponse::new("Book updated successfully!", BookResponse::from(book)))
}

/// DELETE /api/v1/books/{id}
async fn delete_book(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.book_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        let query = BookListQuery {
            search: Some(" dune ".to_string()),
            author: Some("3".to_string()),
            min_year: Some("1960".to_string()),
            ordering: Some("-publication_year".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.search.as_deref(), Some("dune"));
        assert_eq!(filter.author_id, Some(3));
        assert_eq!(filter.min_year, Some(1960));
        assert_eq!(filter.ordering, BookOrdering::YearDesc);
    }

    #[test]
    fn test_filter_rejects_bad_values() {
        let query = BookListQuery {
            publication_year: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(query.filter().is_err());

        let query = BookListQuery {
            ordering: Some("rating".to_string()),
            ..Default::default()
        };
        let error = query.filter().unwrap_err();
        assert!(error.error.details.unwrap().get("ordering").is_some());
    }
}
