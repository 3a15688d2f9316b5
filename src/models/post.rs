//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tag;

/// A blog post with its author and engagement counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    /// Markdown source
    pub content: String,
    /// Rendered, sanitized HTML
    pub content_html: String,
    pub tags: Vec<Tag>,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Replaces the whole tag set when present
    pub tags: Option<Vec<String>>,
}

/// Post list filters
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive match on title or content
    pub search: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    pub author_id: Option<i64>,
}
