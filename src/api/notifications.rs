//! Notification API endpoints
//!
//! All routes act on the current user's own notifications.
//!
//! - GET /api/v1/notifications
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{paginate, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{MessageResponse, PaginatedResponse};
use crate::models::Notification;

/// One page of notifications, newest first
#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    #[serde(flatten)]
    pub page: PaginatedResponse<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub message: String,
    pub marked: u64,
}

/// Build the notifications router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}

/// GET /api/v1/notifications
async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let params = query.params(&state.config.pagination)?;
    let result = state.notification_service.list(user.0.id, &params).await?;
    Ok(Json(NotificationListResponse {
        page: paginate(result.page)?,
        unread_count: result.unread_count,
    }))
}

/// POST /api/v1/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.notification_service.mark_read(user.0.id, id).await?;
    Ok(MessageResponse::new("Notification marked as read."))
}

/// POST /api/v1/notifications/read-all
async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MarkedResponse>, ApiError> {
    let marked = state.notification_service.mark_all_read(user.0.id).await?;
    Ok(Json(MarkedResponse {
        message: "All notifications marked as read.".to_string(),
        marked,
    }))
}
