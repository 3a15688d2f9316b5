//! Post API endpoints
//!
//! - GET /api/v1/posts, POST /api/v1/posts
//! - GET|PUT|PATCH|DELETE /api/v1/posts/{id}
//! - POST /api/v1/posts/{id}/like, /posts/{id}/unlike
//! - GET /api/v1/posts/{id}/comments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{paginate, parse_opt, text_opt, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{MessageResponse, PaginatedResponse};
use crate::models::{Comment, CreatePostInput, Post, PostFilter, UpdatePostInput};

#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    #[serde(flatten)]
    pub pagination: PaginationQuery,
    pub search: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    /// Author's user id
    pub author: Option<String>,
}

impl PostListQuery {
    pub fn filter(&self) -> Result<PostFilter, ApiError> {
        Ok(PostFilter {
            search: text_opt(&self.search),
            tag: text_opt(&self.tag),
            author_id: parse_opt("author", &self.author, "A valid integer is required.")?,
        })
    }
}

/// Body of create, PUT and PATCH
#[derive(Debug, Default, Deserialize)]
pub struct PostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Tag names
    pub tags: Option<Vec<String>>,
}

impl From<PostRequest> for UpdatePostInput {
    fn from(body: PostRequest) -> Self {
        Self {
            title: body.title,
            content: body.content,
            tags: body.tags,
        }
    }
}

/// Build the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route(
            "/{id}",
            get(get_post)
                .put(replace_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .route("/{id}/like", post(like_post))
        .route("/{id}/unlike", post(unlike_post))
        .route("/{id}/comments", get(post_comments))
}

/// GET /api/v1/posts - newest first
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<PaginatedResponse<Post>>, ApiError> {
    let filter = query.filter()?;
    let params = query.pagination.params(&state.config.pagination)?;
    Ok(Json(paginate(state.post_service.list(&filter, &params).await?)?))
}

/// GET /api/v1/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get(id).await?))
}

/// POST /api/v1/posts - the author is the current user
async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<PostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreatePostInput {
        title: body.title.unwrap_or_default(),
        content: body.content.unwrap_or_default(),
        tags: body.tags.unwrap_or_default(),
    };
    let post = state.post_service.create(user.0.id, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/v1/posts/{id} - author only
async fn replace_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<PostRequest>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(user.0.id, id, body.into(), false).await?))
}

/// PATCH /api/v1/posts/{id} - author only
async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<PostRequest>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(user.0.id, id, body.into(), true).await?))
}

/// DELETE /api/v1/posts/{id} - author only
async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/posts/{id}/like
async fn like_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.post_service.like(user.0.id, id).await?;
    Ok(MessageResponse::new("Post liked."))
}

/// POST /api/v1/posts/{id}/unlike
async fn unlike_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.post_service.unlike(user.0.id, id).await?;
    Ok(MessageResponse::new("Post unliked."))
}

/// GET /api/v1/posts/{id}/comments - oldest first
async fn post_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Comment>>, ApiError> {
    let post = state.post_service.get(id).await?;
    let params = query.params(&state.config.pagination)?;
    Ok(Json(paginate(
        state.comment_service.list(Some(post.id), &params).await?,
    )?))
}
