//! Library API endpoints
//!
//! Reads are public. Every write needs a librarian or admin.
//!
//! - GET /api/v1/libraries, POST /api/v1/libraries
//! - GET|PUT|DELETE /api/v1/libraries/{id}
//! - POST|DELETE /api/v1/libraries/{id}/books/{book_id}
//! - PUT|DELETE /api/v1/libraries/{id}/librarian

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::common::{paginate, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, CatalogManager};
use crate::api::responses::{BookResponse, PaginatedResponse};
use crate::models::{Librarian, Library, LibraryDetail};

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

/// Library with its books and librarian
#[derive(Debug, Serialize)]
pub struct LibraryDetailResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub books: Vec<BookResponse>,
    pub librarian: Option<Librarian>,
}

impl From<LibraryDetail> for LibraryDetailResponse {
    fn from(detail: LibraryDetail) -> Self {
        Self {
            id: detail.library.id,
            name: detail.library.name,
            created_at: detail.library.created_at,
            books: detail.books.into_iter().map(BookResponse::from).collect(),
            librarian: detail.librarian,
        }
    }
}

/// Build the libraries router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_libraries).post(create_library))
        .route(
            "/{id}",
            get(get_library).put(rename_library).delete(delete_library),
        )
        .route(
            "/{id}/books/{book_id}",
            post(add_book).delete(remove_book),
        )
        .route(
            "/{id}/librarian",
            put(set_librarian).delete(remove_librarian),
        )
}

/// GET /api/v1/libraries
async fn list_libraries(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Library>>, ApiError> {
    let params = query.params(&state.config.pagination)?;
    Ok(Json(paginate(state.library_service.list(&params).await?)?))
}

/// GET /api/v1/libraries/{id}
async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LibraryDetailResponse>, ApiError> {
    Ok(Json(state.library_service.get(id).await?.into()))
}

/// POST /api/v1/libraries
async fn create_library(
    State(state): State<AppState>,
    manager: CatalogManager,
    Json(body): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let library = state.library_service.create(&body.name).await?;
    tracing::info!(user_id = manager.0.id, library_id = library.id, "Library created");
    Ok((StatusCode::CREATED, Json(library)))
}

/// PUT /api/v1/libraries/{id}
async fn rename_library(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path(id): Path<i64>,
    Json(body): Json<NameRequest>,
) -> Result<Json<Library>, ApiError> {
    Ok(Json(state.library_service.rename(id, &body.name).await?))
}

/// DELETE /api/v1/libraries/{id}
async fn delete_library(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.library_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/libraries/{id}/books/{book_id}
async fn add_book(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path((id, book_id)): Path<(i64, i64)>,
) -> Result<Json<LibraryDetailResponse>, ApiError> {
    Ok(Json(state.library_service.add_book(id, book_id).await?.into()))
}

/// DELETE /api/v1/libraries/{id}/books/{book_id}
async fn remove_book(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path((id, book_id)): Path<(i64, i64)>,
) -> Result<Json<LibraryDetailResponse>, ApiError> {
    Ok(Json(state.library_service.remove_book(id, book_id).await?.into()))
}

/// PUT /api/v1/libraries/{id}/librarian - `{"name": ...}`
async fn set_librarian(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path(id): Path<i64>,
    Json(body): Json<NameRequest>,
) -> Result<Json<Librarian>, ApiError> {
    Ok(Json(state.library_service.set_librarian(id, &body.name).await?))
}

/// DELETE /api/v1/libraries/{id}/librarian
async fn remove_librarian(
    State(state): State<AppState>,
    _manager: CatalogManager,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.library_service.remove_librarian(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
