//! Author service

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{AuthorRepository, BookRepository};
use crate::models::{Author, Book, ListParams, PagedResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const AUTHOR_NAME_MAX_LEN: usize = 100;

/// Page size used when walking the whole author table
const ALL_AUTHORS_BATCH: u32 = 100;

/// Cache key prefix for author detail
pub(crate) const CACHE_KEY_AUTHOR_BY_ID: &str = "author:id:";

#[derive(Debug, thiserror::Error)]
pub enum AuthorServiceError {
    #[error("Author not found")]
    NotFound,

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// An author with the books they wrote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorDetail {
    pub id: i64,
    pub name: String,
    pub related_books: Vec<Book>,
}

pub struct AuthorService {
    author_repo: Arc<dyn AuthorRepository>,
    book_repo: Arc<dyn BookRepository>,
    cache: Arc<Cache>,
}

impl AuthorService {
    pub fn new(
        author_repo: Arc<dyn AuthorRepository>,
        book_repo: Arc<dyn BookRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            author_repo,
            book_repo,
            cache,
        }
    }

    pub async fn list(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Author>, AuthorServiceError> {
        let (authors, total) = self
            .author_repo
            .list(params)
            .await
            .context("Failed to list authors")?;
        Ok(PagedResult::new(authors, total, params))
    }

    /// Every author ordered by name, read page by page
    pub async fn list_all(&self) -> Result<Vec<Author>, AuthorServiceError> {
        let mut authors = Vec::new();
        let mut params = ListParams::new(1, ALL_AUTHORS_BATCH);
        loop {
            let page = self.list(&params).await?;
            let more = page.has_next();
            authors.extend(page.items);
            if !more {
                return Ok(authors);
            }
            params.page += 1;
        }
    }

    /// Author detail with related books, served from cache when possible
    pub async fn get(&self, id: i64) -> Result<AuthorDetail, AuthorServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_AUTHOR_BY_ID, id);
        if let Ok(Some(detail)) = self.cache.get::<AuthorDetail>(&cache_key).await {
            return Ok(detail);
        }

        let author = self
            .author_repo
            .get_by_id(id)
            .await
            .context("Failed to get author")?
            .ok_or(AuthorServiceError::NotFound)?;
        let related_books = self
            .book_repo
            .list_by_author(author.id)
            .await
            .context("Failed to list author's books")?;

        let detail = AuthorDetail {
            id: author.id,
            name: author.name,
            related_books,
        };
        let _ = self
            .cache
            .set(&cache_key, &detail, self.cache.default_ttl())
            .await;
        Ok(detail)
    }

    pub async fn create(&self, name: &str) -> Result<Author, AuthorServiceError> {
        let name = validate_name(name)?;
        let author = self
            .author_repo
            .create(&name)
            .await
            .context("Failed to create author")?;
        tracing::info!(author_id = author.id, "Created author {}", author.name);
        Ok(author)
    }

    /// Rename an author; `None` (a PATCH without a name) keeps it
    pub async fn update(&self, id: i64, name: Option<&str>) -> Result<Author, AuthorServiceError> {
        let author = match name {
            Some(name) => {
                let name = validate_name(name)?;
                self.author_repo
                    .rename(id, &name)
                    .await
                    .context("Failed to rename author")?
            }
            None => self
                .author_repo
                .get_by_id(id)
                .await
                .context("Failed to get author")?,
        }
        .ok_or(AuthorServiceError::NotFound)?;

        self.invalidate(id).await;
        Ok(author)
    }

    /// Delete an author and, by cascade, their books
    pub async fn delete(&self, id: i64) -> Result<(), AuthorServiceError> {
        let deleted = self
            .author_repo
            .delete(id)
            .await
            .context("Failed to delete author")?;
        if !deleted {
            return Err(AuthorServiceError::NotFound);
        }
        self.invalidate(id).await;
        Ok(())
    }

    /// Drop the author's detail and every cached book, since book entries
    /// embed the author's name
    async fn invalidate(&self, id: i64) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_AUTHOR_BY_ID, id))
            .await;
        let _ = self
            .cache
            .delete_pattern(&format!("{}*", super::book::CACHE_KEY_BOOK_BY_ID))
            .await;
    }
}

fn validate_name(name: &str) -> Result<String, AuthorServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthorServiceError::ValidationError {
            field: "name".to_string(),
            message: "This field is required.".to_string(),
        });
    }
    if name.chars().count() > AUTHOR_NAME_MAX_LEN {
        return Err(AuthorServiceError::ValidationError {
            field: "name".to_string(),
            message: format!(
                "Ensure this field has no more than {} characters.",
                AUTHOR_NAME_MAX_LEN
            ),
        });
    }
    Ok(name.to_string())
}
