//! GET /api/v1/feed
//!
//! Posts by the users the current user follows, newest first.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::api::common::{paginate, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PaginatedResponse;
use crate::models::Post;

pub async fn feed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Post>>, ApiError> {
    let params = query.params(&state.config.pagination)?;
    Ok(Json(paginate(state.post_service.feed(user.0.id, &params).await?)?))
}
