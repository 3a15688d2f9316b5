//! Shared API response types
//!
//! `ApiError` is the single error body of the JSON API. Each service error
//! converts into it here, so handlers can use `?` on service calls.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{Book, PagedResult};
use crate::services::{
    AuthorServiceError, BookServiceError, CommentServiceError, FollowServiceError,
    LibraryServiceError, NotificationServiceError, PostServiceError, UserServiceError,
};

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Validation error with `{"field": ["message"]}` details
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_details("VALIDATION_ERROR", message.clone(), json!({ field: [message] }))
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details("RATE_LIMIT", message, json!({ "retry_after": retry_after }))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Log the cause and hide it from the client
fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", e);
    ApiError::internal_error("Internal server error")
}

pub const MSG_PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            UserServiceError::AuthenticationError(msg) => ApiError::field("non_field_errors", msg),
            UserServiceError::NotFound => ApiError::not_found("User not found."),
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<FollowServiceError> for ApiError {
    fn from(e: FollowServiceError) -> Self {
        match e {
            FollowServiceError::NotFound => ApiError::not_found("User not found."),
            FollowServiceError::SelfFollow(msg) => ApiError::validation_error(msg),
            FollowServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<AuthorServiceError> for ApiError {
    fn from(e: AuthorServiceError) -> Self {
        match e {
            AuthorServiceError::NotFound => ApiError::not_found("Author not found."),
            AuthorServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            AuthorServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<BookServiceError> for ApiError {
    fn from(e: BookServiceError) -> Self {
        match e {
            BookServiceError::NotFound => ApiError::not_found("Book not found."),
            BookServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            BookServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<LibraryServiceError> for ApiError {
    fn from(e: LibraryServiceError) -> Self {
        match e {
            LibraryServiceError::NotFound(what) => ApiError::not_found(format!("{} not found.", what)),
            LibraryServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            LibraryServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => ApiError::not_found("Post not found."),
            PostServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            PostServiceError::InvalidAction(msg) => ApiError::validation_error(msg),
            PostServiceError::PermissionDenied => ApiError::forbidden(MSG_PERMISSION_DENIED),
            PostServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound => ApiError::not_found("Comment not found."),
            CommentServiceError::ValidationError { field, message } => ApiError::field(&field, message),
            CommentServiceError::PermissionDenied => ApiError::forbidden(MSG_PERMISSION_DENIED),
            CommentServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(e: NotificationServiceError) -> Self {
        match e {
            NotificationServiceError::NotFound => ApiError::not_found("Notification not found."),
            NotificationServiceError::InternalError(e) => internal(e),
        }
    }
}

// ============================================================================
// Bodies
// ============================================================================

/// `{"message": ...}`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// `{"message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            data,
        })
    }
}

/// Book as the API presents it: the author by name and by id
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub author_id: i64,
    pub publication_year: i32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author_name,
            author_id: book.author_id,
            publication_year: book.publication_year,
        }
    }
}

/// One page of a list endpoint
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            count: page.total,
            page: page.page,
            page_size: page.per_page,
            total_pages,
            next: page.has_next().then(|| page.page + 1),
            previous: page.has_prev().then(|| page.page - 1),
            results: page.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::field("title", "x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::new("CONFLICT", "x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::rate_limited("x", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::new("WHATEVER", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_field_details_shape() {
        let error = ApiError::field("publication_year", "Please enter a valid year.");
        assert_eq!(
            error.error.details,
            Some(json!({"publication_year": ["Please enter a valid year."]}))
        );
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let error: ApiError = BookServiceError::InternalError(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(error.error.code, "INTERNAL_ERROR");
        assert!(!error.error.message.contains("disk"));
    }

    #[test]
    fn test_service_error_mapping() {
        let error: ApiError = PostServiceError::PermissionDenied.into();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        let error: ApiError = UserServiceError::AuthenticationError("Invalid email or password.".into()).into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.error.details,
            Some(json!({"non_field_errors": ["Invalid email or password."]}))
        );
    }

    #[test]
    fn test_paginated_links() {
        let params = ListParams::new(2, 10);
        let page: PaginatedResponse<i32> = PagedResult::new(vec![1, 2], 25, &params).into();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
        assert_eq!(page.count, 25);
    }
}
