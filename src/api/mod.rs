//! API layer - HTTP handlers and routing
//!
//! JSON endpoints live under `/api/v1`; the server-rendered pages, static
//! assets and uploaded files are served from the root.

pub mod accounts;
pub mod admin;
pub mod authors;
pub mod books;
pub mod comments;
pub mod common;
pub mod feed;
pub mod health;
pub mod libraries;
pub mod lookup;
pub mod middleware;
pub mod notifications;
pub mod pages;
pub mod posts;
pub mod responses;
pub mod static_files;
pub mod tags;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .nest("/accounts", accounts::router())
        .nest("/admin", admin_routes)
        .nest("/books", books::router())
        .nest("/authors", authors::router())
        .nest("/libraries", libraries::router())
        .nest("/lookup", lookup::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/notifications", notifications::router())
        .route("/feed", get(feed::feed))
        .route("/tags", get(tags::list_tags))
        .route("/health", get(health::health))
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e);
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let html_pages = pages::router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::optional_auth,
    ));

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/static/{*path}", get(static_files::serve_static))
        .route("/uploads/{*path}", get(static_files::serve_uploads))
        .merge(html_pages)
        .fallback(pages::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
