//! Comment API endpoints
//!
//! - GET /api/v1/comments?post=, POST /api/v1/comments
//! - GET|PUT|PATCH|DELETE /api/v1/comments/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{paginate, parse_opt, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PaginatedResponse;
use crate::models::{Comment, CreateCommentInput};

#[derive(Debug, Default, Deserialize)]
pub struct CommentListQuery {
    #[serde(flatten)]
    pub pagination: PaginationQuery,
    /// Post id
    pub post: Option<String>,
}

/// Request body for creating a comment
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post: Option<i64>,
    #[serde(default)]
    pub content: String,
}

/// Request body for editing a comment
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: String,
}

/// Build the comments router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/{id}",
            get(get_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
}

/// GET /api/v1/comments - oldest first
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<PaginatedResponse<Comment>>, ApiError> {
    let post_id = parse_opt("post", &query.post, "A valid integer is required.")?;
    let params = query.pagination.params(&state.config.pagination)?;
    Ok(Json(paginate(state.comment_service.list(post_id, &params).await?)?))
}

/// GET /api/v1/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.get(id).await?))
}

/// POST /api/v1/comments
async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = body
        .post
        .ok_or_else(|| ApiError::field("post", "This field is required."))?;
    let comment = state
        .comment_service
        .create(
            user.0.id,
            CreateCommentInput {
                post_id,
                content: body.content,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT|PATCH /api/v1/comments/{id} - author only
async fn update_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(
        state
            .comment_service
            .update(user.0.id, id, &body.content)
            .await?,
    ))
}

/// DELETE /api/v1/comments/{id} - author only
async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
