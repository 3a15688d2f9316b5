//! Admin API endpoints
//!
//! Plain role-gated handlers over user accounts. Mounted behind
//! `require_auth` and `require_admin`.
//!
//! - GET /api/v1/admin/users
//! - PUT /api/v1/admin/users/{id}/role
//! - PUT /api/v1/admin/users/{id}/active

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::common::{paginate, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PaginatedResponse;
use crate::models::{User, UserRole};

/// A user as the admin list shows it
#[derive(Debug, Serialize)]
pub struct AdminUserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for AdminUserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}/active", put(set_active))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<AdminUserResponse>>, ApiError> {
    let params = query.params(&state.config.pagination)?;
    let page = state.user_service.list_users(&params).await?;
    Ok(Json(paginate(page.map(AdminUserResponse::from))?))
}

/// PUT /api/v1/admin/users/{id}/role
async fn set_role(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    let role: UserRole = body.role.parse().map_err(|_| {
        ApiError::field("role", format!("\"{}\" is not a valid choice.", body.role))
    })?;
    let user = state.user_service.set_role(id, role).await?;
    tracing::info!(admin_id = admin.0.id, user_id = id, "Role set to {}", role);
    Ok(Json(user.into()))
}

/// PUT /api/v1/admin/users/{id}/active
///
/// Deactivating an account revokes its tokens. Admins cannot deactivate
/// themselves.
async fn set_active(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    if admin.0.id == id && !body.is_active {
        return Err(ApiError::validation_error("You cannot deactivate your own account."));
    }
    let user = state.user_service.set_active(id, body.is_active).await?;
    tracing::info!(admin_id = admin.0.id, user_id = id, active = body.is_active, "Account status changed");
    Ok(Json(user.into()))
}
