//! Author API endpoints
//!
//! - GET /api/v1/authors, POST /api/v1/authors
//! - GET|PUT|PATCH|DELETE /api/v1/authors/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{paginate, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{BookResponse, PaginatedResponse};
use crate::models::Author;
use crate::services::AuthorDetail;

#[derive(Debug, Deserialize)]
pub struct AuthorRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    pub id: i64,
    pub name: String,
}

impl From<Author> for AuthorResponse {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            name: author.name,
        }
    }
}

/// Author with the books they wrote
#[derive(Debug, Serialize)]
pub struct AuthorDetailResponse {
    pub id: i64,
    pub name: String,
    pub related_books: Vec<BookResponse>,
}

impl From<AuthorDetail> for AuthorDetailResponse {
    fn from(detail: AuthorDetail) -> Self {
        Self {
            id: detail.id,
            name: detail.name,
            related_books: detail.related_books.into_iter().map(BookResponse::from).collect(),
        }
    }
}

/// Build the authors router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_authors).post(create_author))
        .route(
            "/{id}",
            get(get_author)
                .put(replace_author)
                .patch(update_author)
                .delete(delete_author),
        )
}

/// GET /api/v1/authors
async fn list_authors(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<AuthorResponse>>, ApiError> {
    let params = query.params(&state.config.pagination)?;
    let page = state.author_service.list(&params).await?;
    Ok(Json(paginate(page.map(AuthorResponse::from))?))
}

/// GET /api/v1/authors/{id}
async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AuthorDetailResponse>, ApiError> {
    Ok(Json(state.author_service.get(id).await?.into()))
}

/// POST /api/v1/authors
async fn create_author(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<AuthorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = state
        .author_service
        .create(body.name.as_deref().unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(AuthorResponse::from(author))))
}

/// PUT /api/v1/authors/{id} - name required
async fn replace_author(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AuthorRequest>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let name = body.name.unwrap_or_default();
    Ok(Json(state.author_service.update(id, Some(&name)).await?.into()))
}

/// PATCH /api/v1/authors/{id}
async fn update_author(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AuthorRequest>,
) -> Result<Json<AuthorResponse>, ApiError> {
    Ok(Json(
        state
            .author_service
            .update(id, body.name.as_deref())
            .await?
            .into(),
    ))
}

/// DELETE /api/v1/authors/{id}
async fn delete_author(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.author_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
