//! Account API endpoints
//!
//! - POST /api/v1/accounts/register
//! - POST /api/v1/accounts/login
//! - POST /api/v1/accounts/logout
//! - GET|PUT|PATCH /api/v1/accounts/profile
//! - POST /api/v1/accounts/profile/picture
//! - POST /api/v1/accounts/follow/{user_id}, /accounts/unfollow/{user_id}
//! - GET /api/v1/accounts/users/{id} (+ /followers, /following)
//! - GET /api/v1/accounts/roles/{admin,librarian,member}

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::middleware::{
    extract_session_token, ApiError, AppState, AuthenticatedUser, SESSION_COOKIE,
};
use crate::api::responses::{MessageResponse, MSG_PERMISSION_DENIED};
use crate::api::upload::{store_image, UploadResponse};
use crate::models::{UpdateProfileInput, UserRole, UserSummary};
use crate::services::user::{
    LoginInput, Profile, RegisterInput, UserServiceError, MSG_INVALID_CREDENTIALS,
};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Profile,
    pub message: String,
}

/// Profile as other users see it
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub profile_picture: String,
    pub bio: String,
    pub followers_count: i64,
    pub following_count: i64,
}

impl From<Profile> for PublicProfile {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            profile_picture: profile.profile_picture,
            bio: profile.bio,
            followers_count: profile.followers_count,
            following_count: profile.following_count,
        }
    }
}

/// Build the accounts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route(
            "/profile",
            get(get_profile).put(replace_profile).patch(patch_profile),
        )
        .route(
            "/profile/picture",
            post(upload_picture).layer(DefaultBodyLimit::disable()),
        )
        .route("/follow/{user_id}", post(follow))
        .route("/unfollow/{user_id}", post(unfollow))
        .route("/users/{id}", get(public_profile))
        .route("/users/{id}/followers", get(followers))
        .route("/users/{id}/following", get(following))
        .route("/roles/admin", get(admin_view))
        .route("/roles/librarian", get(librarian_view))
        .route("/roles/member", get(member_view))
}

// ============================================================================
// Session cookie
// ============================================================================

/// `Set-Cookie` value carrying `token` for `days`
pub fn session_cookie(token: &str, days: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        days * 24 * 60 * 60
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

pub fn cookie_header(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| ApiError::internal_error("Invalid cookie value"))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// Client IP from proxy headers
///
/// Checks X-Forwarded-For first, then X-Real-IP.
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|s| s.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Greeting shown on a role's page
pub fn role_greeting(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "Welcome Admin! You have full access to the system.",
        UserRole::Librarian => "Welcome Librarian! You can manage books.",
        UserRole::Member => "Welcome Member! You can browse books.",
    }
}

// ============================================================================
// Registration and login
// ============================================================================

/// POST /api/v1/accounts/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_service
        .register(RegisterInput::new(body.username, body.email, body.password))
        .await?;
    let profile = state.user_service.profile_of(user).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Check both login rate limits, counting this request against the IP
pub async fn check_login_limits(
    state: &AppState,
    headers: &HeaderMap,
    identity: &str,
) -> Result<(), ApiError> {
    if let Some(ip) = client_ip(headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit exceeded for IP");
            return Err(ApiError::rate_limited(
                "Too many login requests. Please try again later.",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    let identity = identity.trim().to_lowercase();
    if !identity.is_empty() && state.rate_limiter.is_identity_limited(&identity).await {
        tracing::warn!("Too many failed logins for {}", identity);
        return Err(ApiError::rate_limited(
            "Too many failed login attempts. Please try again in 15 minutes.",
            900,
        ));
    }
    Ok(())
}

/// Record a failed credential check; other errors are not counted
pub async fn record_login_result<T>(
    state: &AppState,
    identity: &str,
    result: &Result<T, UserServiceError>,
) {
    let identity = identity.trim().to_lowercase();
    match result {
        Ok(_) => state.rate_limiter.clear_failures(&identity).await,
        Err(UserServiceError::AuthenticationError(msg)) if msg == MSG_INVALID_CREDENTIALS => {
            state.rate_limiter.record_failure(&identity).await
        }
        Err(_) => {}
    }
}

/// POST /api/v1/accounts/login
///
/// Sets the session cookie as well as returning the token.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_login_limits(&state, &headers, &body.email).await?;

    let result = state
        .user_service
        .login(LoginInput::new(body.email.clone(), body.password))
        .await;
    record_login_result(&state, &body.email, &result).await;
    let (session, user) = result?;

    tracing::info!(user_id = user.id, "User {} logged in", user.username);
    let message = format!("Welcome back, {}!", user.username);
    let profile = state.user_service.profile_of(user).await?;
    let cookie = session_cookie(&session.id, state.config.auth.session_days);
    let response_headers = cookie_header(&cookie)?;

    Ok((
        response_headers,
        Json(LoginResponse {
            token: session.id,
            user: profile,
            message,
        }),
    ))
}

/// POST /api/v1/accounts/logout
///
/// Deletes the token and clears the cookie.
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok((StatusCode::NO_CONTENT, cookie_header(&clear_session_cookie())?))
}

// ============================================================================
// Profile
// ============================================================================

/// GET /api/v1/accounts/profile
async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.user_service.profile_of(user.0).await?))
}

/// PUT /api/v1/accounts/profile - username and email required
async fn replace_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    let user = state.user_service.update_profile(user.0.id, body, false).await?;
    Ok(Json(state.user_service.profile_of(user).await?))
}

/// PATCH /api/v1/accounts/profile - every field optional
async fn patch_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    let user = state.user_service.update_profile(user.0.id, body, true).await?;
    Ok(Json(state.user_service.profile_of(user).await?))
}

/// POST /api/v1/accounts/profile/picture (multipart `file`)
async fn upload_picture(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = store_image(&state.config.upload, multipart).await?;
    state
        .user_service
        .set_profile_picture(user.0.id, &upload.url)
        .await?;
    Ok(Json(upload))
}

// ============================================================================
// Following
// ============================================================================

/// POST /api/v1/accounts/follow/{user_id}
async fn follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state.follow_service.follow(user.0.id, user_id).await?;
    Ok(MessageResponse::new(format!(
        "You are now following {}.",
        target.username
    )))
}

/// POST /api/v1/accounts/unfollow/{user_id}
async fn unfollow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state.follow_service.unfollow(user.0.id, user_id).await?;
    Ok(MessageResponse::new(format!(
        "You have unfollowed {}.",
        target.username
    )))
}

/// GET /api/v1/accounts/users/{id}
async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicProfile>, ApiError> {
    Ok(Json(state.user_service.profile(id).await?.into()))
}

/// GET /api/v1/accounts/users/{id}/followers
async fn followers(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.follow_service.followers(id).await?))
}

/// GET /api/v1/accounts/users/{id}/following
async fn following(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.follow_service.following(id).await?))
}

// ============================================================================
// Role pages
// ============================================================================

fn role_view(user: &AuthenticatedUser, role: UserRole) -> Result<impl IntoResponse, ApiError> {
    if user.0.role != role {
        return Err(ApiError::forbidden(MSG_PERMISSION_DENIED));
    }
    Ok(MessageResponse::new(role_greeting(role)))
}

/// GET /api/v1/accounts/roles/admin
async fn admin_view(user: AuthenticatedUser) -> Result<impl IntoResponse, ApiError> {
    role_view(&user, UserRole::Admin)
}

/// GET /api/v1/accounts/roles/librarian
async fn librarian_view(user: AuthenticatedUser) -> Result<impl IntoResponse, ApiError> {
    role_view(&user, UserRole::Librarian)
}

/// GET /api/v1/accounts/roles/member
async fn member_view(user: AuthenticatedUser) -> Result<impl IntoResponse, ApiError> {
    role_view(&user, UserRole::Member)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie() {
        let cookie = session_cookie("abc", 7);
        assert_eq!(cookie, "session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800");
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), Some("10.0.0.2".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_role_greetings() {
        assert!(role_greeting(UserRole::Admin).starts_with("Welcome Admin!"));
        assert!(role_greeting(UserRole::Librarian).starts_with("Welcome Librarian!"));
        assert!(role_greeting(UserRole::Member).starts_with("Welcome Member!"));
    }
}
