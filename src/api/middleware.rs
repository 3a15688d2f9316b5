//! API middleware
//!
//! Contains middleware for:
//! - Authentication (token and session cookie validation)
//! - Authorization (role checks)
//!
//! Also holds the shared application state and the extractors handlers use
//! to get at the signed-in user.

use anyhow::Result;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAuthorRepository, SqlxBookRepository, SqlxCommentRepository, SqlxFollowRepository,
    SqlxLibraryRepository, SqlxLikeRepository, SqlxNotificationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AuthorService, BookService, CommentService, FollowService, LibraryService, LoginRateLimiter,
    NotificationService, PostService, UserService,
};
use crate::theme::ThemeEngine;

pub use super::responses::ApiError;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub follow_service: Arc<FollowService>,
    pub author_service: Arc<AuthorService>,
    pub book_service: Arc<BookService>,
    pub library_service: Arc<LibraryService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub notification_service: Arc<NotificationService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub theme: Arc<ThemeEngine>,
}

impl AppState {
    /// Wire repositories and services over an already migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> Result<Self> {
        let cache = create_cache(&config.cache);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool.clone());
        let author_repo = SqlxAuthorRepository::boxed(pool.clone());
        let book_repo = SqlxBookRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());

        let notification_service = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
        ));
        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            follow_repo.clone(),
            config.auth.session_days,
        ));
        let follow_service = Arc::new(FollowService::new(
            follow_repo,
            user_repo,
            notification_service.clone(),
        ));
        let author_service = Arc::new(AuthorService::new(
            author_repo.clone(),
            book_repo.clone(),
            cache.clone(),
        ));
        let book_service = Arc::new(BookService::new(
            book_repo.clone(),
            author_repo,
            cache.clone(),
            config.catalog.clone(),
        ));
        let library_service = Arc::new(LibraryService::new(
            SqlxLibraryRepository::boxed(pool.clone()),
            book_repo,
        ));
        let post_service = Arc::new(PostService::new(
            post_repo.clone(),
            SqlxLikeRepository::boxed(pool.clone()),
            notification_service.clone(),
            cache,
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            post_repo,
            notification_service.clone(),
        ));

        Ok(Self {
            pool,
            config: Arc::new(config),
            user_service,
            follow_service,
            author_service,
            book_service,
            library_service,
            post_service,
            comment_service,
            notification_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            theme: Arc::new(ThemeEngine::new()?),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The signed-in user if there is one; set by `optional_auth`
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Extract the session token from the request headers
///
/// Accepts `Authorization: Bearer <token>`, `Authorization: Token <token>`
/// and the `session` cookie, in that order.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str
                .strip_prefix("Bearer ")
                .or_else(|| auth_str.strip_prefix("Token "))
            {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    read_cookie(headers, SESSION_COOKIE)
}

/// Value of the cookie `name`, if present and non-empty
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    Ok(state.user_service.validate_session(&token).await?)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if extract_session_token(request.headers()).is_none() {
        return Err(ApiError::unauthorized(
            "Authentication credentials were not provided.",
        ));
    }
    let user = resolve_user(&state, request.headers())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token."))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match resolve_user(&state, request.headers()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Session lookup failed: {}", e.error.message);
            None
        }
    };
    if let Some(user) = &user {
        request.extensions_mut().insert(AuthenticatedUser(user.clone()));
    }
    request.extensions_mut().insert(MaybeUser(user));
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden(super::responses::MSG_PERMISSION_DENIED));
    }

    Ok(next.run(request).await)
}

/// Uses the user placed by `require_auth` when present, otherwise validates
/// the request's token itself
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }
        if extract_session_token(&parts.headers).is_none() {
            return Err(ApiError::unauthorized(
                "Authentication credentials were not provided.",
            ));
        }
        resolve_user(state, &parts.headers)
            .await?
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token."))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<MaybeUser>() {
            return Ok(user.clone());
        }
        Ok(MaybeUser(resolve_user(state, &parts.headers).await?))
    }
}

/// A signed-in librarian or admin
#[derive(Debug, Clone)]
pub struct CatalogManager(pub User);

impl FromRequestParts<AppState> for CatalogManager {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.can_manage_catalog() {
            return Err(ApiError::forbidden(super::responses::MSG_PERMISSION_DENIED));
        }
        Ok(CatalogManager(user))
    }
}
