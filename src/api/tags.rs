//! GET /api/v1/tags
//!
//! Every tag with the number of posts carrying it.

use axum::{extract::State, Json};

use crate::api::middleware::{ApiError, AppState};
use crate::models::TagWithCount;

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(state.post_service.tags().await?))
}
