//! Book service
//!
//! Validation, full and partial updates, and the cached book detail. Every
//! write drops the book's cached entry and the detail of each author whose
//! book list changed.

use crate::cache::{Cache, CacheLayer};
use crate::config::CatalogConfig;
use crate::db::repositories::{AuthorRepository, BookRepository};
use crate::models::{Book, BookFilter, CreateBookInput, ListParams, PagedResult, UpdateBookInput};
use crate::services::author::CACHE_KEY_AUTHOR_BY_ID;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const TITLE_MAX_LEN: usize = 200;

pub const MSG_YEAR_IN_FUTURE: &str = "Publication year cannot be in the future.";
pub const MSG_YEAR_INVALID: &str = "Please enter a valid year.";

/// Cache key prefix for book detail
pub(crate) const CACHE_KEY_BOOK_BY_ID: &str = "book:id:";

#[derive(Debug, thiserror::Error)]
pub enum BookServiceError {
    #[error("Book not found")]
    NotFound,

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl BookServiceError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub struct BookService {
    book_repo: Arc<dyn BookRepository>,
    author_repo: Arc<dyn AuthorRepository>,
    cache: Arc<Cache>,
    catalog: CatalogConfig,
}

impl BookService {
    pub fn new(
        book_repo: Arc<dyn BookRepository>,
        author_repo: Arc<dyn AuthorRepository>,
        cache: Arc<Cache>,
        catalog: CatalogConfig,
    ) -> Self {
        Self {
            book_repo,
            author_repo,
            cache,
            catalog,
        }
    }

    pub async fn list(
        &self,
        filter: &BookFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Book>, BookServiceError> {
        let (books, total) = self
            .book_repo
            .list(filter, params)
            .await
            .context("Failed to list books")?;
        Ok(PagedResult::new(books, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Book, BookServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_BOOK_BY_ID, id);
        if let Ok(Some(book)) = self.cache.get::<Book>(&cache_key).await {
            return Ok(book);
        }

        let book = self
            .book_repo
            .get_by_id(id)
            .await
            .context("Failed to get book")?
            .ok_or(BookServiceError::NotFound)?;
        let _ = self.cache.set(&cache_key, &book, self.cache.default_ttl()).await;
        Ok(book)
    }

    /// Books by the author with exactly this name
    pub async fn books_by_author(&self, name: &str) -> Result<Vec<Book>, BookServiceError> {
        let author = self
            .author_repo
            .get_by_name(name)
            .await
            .context("Failed to get author by name")?
            .ok_or(BookServiceError::NotFound)?;
        Ok(self
            .book_repo
            .list_by_author(author.id)
            .await
            .context("Failed to list author's books")?)
    }

    pub async fn create(&self, input: CreateBookInput) -> Result<Book, BookServiceError> {
        let input = CreateBookInput {
            title: self.validate_title(&input.title)?,
            author_id: input.author_id,
            publication_year: self.validate_year(input.publication_year)?,
        };
        self.ensure_author(input.author_id).await?;

        let book = self
            .book_repo
            .create(&input)
            .await
            .context("Failed to create book")?;
        tracing::info!(book_id = book.id, "Created book {}", book.title);
        self.invalidate(book.id, &[book.author_id]).await;
        Ok(book)
    }

    /// Full replace (PUT): every field must be present
    pub async fn replace(&self, id: i64, input: UpdateBookInput) -> Result<Book, BookServiceError> {
        let complete = require_all(input)?;
        self.update(
            id,
            UpdateBookInput {
                title: Some(complete.title),
                author_id: Some(complete.author_id),
                publication_year: Some(complete.publication_year),
            },
        )
        .await
    }

    /// Partial update (PATCH): absent fields keep their stored value
    pub async fn update(&self, id: i64, input: UpdateBookInput) -> Result<Book, BookServiceError> {
        let mut book = self
            .book_repo
            .get_by_id(id)
            .await
            .context("Failed to get book")?
            .ok_or(BookServiceError::NotFound)?;
        let previous_author = book.author_id;

        if let Some(title) = input.title {
            book.title = self.validate_title(&title)?;
        }
        if let Some(year) = input.publication_year {
            book.publication_year = self.validate_year(year)?;
        }
        if let Some(author_id) = input.author_id {
            self.ensure_author(author_id).await?;
            book.author_id = author_id;
        }
        book.updated_at = Utc::now();

        let updated = self
            .book_repo
            .update(&book)
            .await
            .context("Failed to update book")?
            .ok_or(BookServiceError::NotFound)?;
        self.invalidate(id, &[previous_author, updated.author_id]).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), BookServiceError> {
        let book = self
            .book_repo
            .get_by_id(id)
            .await
            .context("Failed to get book")?
            .ok_or(BookServiceError::NotFound)?;
        self.book_repo
            .delete(id)
            .await
            .context("Failed to delete book")?;
        self.invalidate(id, &[book.author_id]).await;
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_title(&self, title: &str) -> Result<String, BookServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BookServiceError::invalid("title", "This field is required."));
        }
        if title.chars().count() > TITLE_MAX_LEN {
            return Err(BookServiceError::invalid(
                "title",
                format!("Ensure this field has no more than {} characters.", TITLE_MAX_LEN),
            ));
        }
        Ok(title.to_string())
    }

    fn validate_year(&self, year: i32) -> Result<i32, BookServiceError> {
        if year > self.catalog.max_publication_year {
            return Err(BookServiceError::invalid("publication_year", MSG_YEAR_IN_FUTURE));
        }
        if year < self.catalog.min_publication_year {
            return Err(BookServiceError::invalid("publication_year", MSG_YEAR_INVALID));
        }
        Ok(year)
    }

    async fn ensure_author(&self, author_id: i64) -> Result<(), BookServiceError> {
        let exists = self
            .author_repo
            .get_by_id(author_id)
            .await
            .context("Failed to get author")?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(BookServiceError::invalid(
                "author",
                format!("Invalid pk \"{}\" - object does not exist.", author_id),
            ))
        }
    }

    async fn invalidate(&self, book_id: i64, author_ids: &[i64]) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_BOOK_BY_ID, book_id))
            .await;
        for author_id in author_ids {
            let _ = self
                .cache
                .delete(&format!("{}{}", CACHE_KEY_AUTHOR_BY_ID, author_id))
                .await;
        }
    }
}

/// Turn a body where every field is optional into a complete one, naming
/// the first missing field
pub fn require_all(input: UpdateBookInput) -> Result<CreateBookInput, BookServiceError> {
    let required = |field: &str| BookServiceError::invalid(field, "This field is required.");
    Ok(CreateBookInput {
        title: input.title.ok_or_else(|| required("title"))?,
        author_id: input.author_id.ok_or_else(|| required("author"))?,
        publication_year: input
            .publication_year
            .ok_or_else(|| required("publication_year"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::test_support::{insert_author, setup_pool};
    use crate::db::repositories::{SqlxAuthorRepository, SqlxBookRepository};
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, BookService) {
        let pool = setup_pool().await;
        let service = BookService::new(
            SqlxBookRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            Arc::new(Cache::Memory(MemoryCache::new())),
            CatalogConfig::default(),
        );
        (pool, service)
    }

    fn input(title: &str, author_id: i64, year: i32) -> CreateBookInput {
        CreateBookInput {
            title: title.to_string(),
            author_id,
            publication_year: year,
        }
    }

    fn field_of(err: BookServiceError) -> (String, String) {
        match err {
            BookServiceError::ValidationError { field, message } => (field, message),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    // ========================================================================
    // Create and validate
    // ========================================================================

    #[tokio::test]
    async fn test_create_returns_author_name() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        let book = service.create(input(" Dune ", author, 1965)).await.unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author_name, "Frank Herbert");
        assert_eq!(book.publication_year, 1965);
    }

    #[tokio::test]
    async fn test_year_bounds() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;

        let err = service.create(input("Future", author, 2026)).await.unwrap_err();
        assert_eq!(
            field_of(err),
            ("publication_year".to_string(), MSG_YEAR_IN_FUTURE.to_string())
        );
        let err = service.create(input("Ancient", author, -5)).await.unwrap_err();
        assert_eq!(field_of(err).1, MSG_YEAR_INVALID);

        assert!(service.create(input("Edge", author, 2025)).await.is_ok());
        assert!(service.create(input("Zero", author, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_author() {
        let (_pool, service) = setup_test_service().await;
        let err = service.create(input("Orphan", 77, 2000)).await.unwrap_err();
        assert_eq!(
            field_of(err),
            ("author".to_string(), "Invalid pk \"77\" - object does not exist.".to_string())
        );
    }

    #[tokio::test]
    async fn test_title_required() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Anon").await;
        assert_eq!(field_of(service.create(input("  ", author, 2000)).await.unwrap_err()).0, "title");
        assert!(service.create(input(&"t".repeat(201), author, 2000)).await.is_err());
    }

    // ========================================================================
    // Update and delete
    // ========================================================================

    #[tokio::test]
    async fn test_patch_keeps_other_fields() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        let book = service.create(input("Dune", author, 1965)).await.unwrap();

        let patch = UpdateBookInput {
            publication_year: Some(1966),
            ..Default::default()
        };
        let updated = service.update(book.id, patch).await.unwrap();
        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.author_id, author);
        assert_eq!(updated.publication_year, 1966);
    }

    #[tokio::test]
    async fn test_put_requires_every_field() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        let book = service.create(input("Dune", author, 1965)).await.unwrap();

        let err = service
            .replace(
                book.id,
                UpdateBookInput {
                    title: Some("Dune Messiah".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(field_of(err), ("author".to_string(), "This field is required.".to_string()));

        let replaced = service
            .replace(
                book.id,
                UpdateBookInput {
                    title: Some("Dune Messiah".to_string()),
                    author_id: Some(author),
                    publication_year: Some(1969),
                },
            )
            .await
            .unwrap();
        assert_eq!(replaced.title, "Dune Messiah");
        assert_eq!(replaced.publication_year, 1969);
    }

    #[tokio::test]
    async fn test_cached_detail_refreshed_after_update() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        let book = service.create(input("Dune", author, 1965)).await.unwrap();
        assert_eq!(service.get(book.id).await.unwrap().title, "Dune");

        let patch = UpdateBookInput {
            title: Some("Children of Dune".to_string()),
            ..Default::default()
        };
        service.update(book.id, patch).await.unwrap();
        assert_eq!(service.get(book.id).await.unwrap().title, "Children of Dune");
    }

    #[tokio::test]
    async fn test_delete() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        let book = service.create(input("Dune", author, 1965)).await.unwrap();
        service.get(book.id).await.unwrap();

        service.delete(book.id).await.unwrap();
        assert!(matches!(service.get(book.id).await, Err(BookServiceError::NotFound)));
        assert!(matches!(service.delete(book.id).await, Err(BookServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_books_by_author_uses_exact_name() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Frank Herbert").await;
        service.create(input("Dune", author, 1965)).await.unwrap();

        assert_eq!(service.books_by_author("Frank Herbert").await.unwrap().len(), 1);
        assert!(matches!(
            service.books_by_author("Frank").await,
            Err(BookServiceError::NotFound)
        ));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::test_support::{insert_author, setup_pool};
    use crate::db::repositories::{SqlxAuthorRepository, SqlxBookRepository};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// A year inside the configured range is stored as given; one past
        /// the max never is
        #[test]
        fn year_range_is_enforced(year in -100i32..2100) {
            tokio_test::block_on(async {
                let pool = setup_pool().await;
                let service = BookService::new(
                    SqlxBookRepository::boxed(pool.clone()),
                    SqlxAuthorRepository::boxed(pool.clone()),
                    Arc::new(Cache::Memory(MemoryCache::new())),
                    CatalogConfig::default(),
                );
                let author = insert_author(&pool, "Writer").await;
                let result = service
                    .create(CreateBookInput {
                        title: "Book".to_string(),
                        author_id: author,
                        publication_year: year,
                    })
                    .await;
                if (0..=2025).contains(&year) {
                    prop_assert_eq!(result.unwrap().publication_year, year);
                } else {
                    prop_assert!(result.is_err());
                }
                Ok(())
            })?;
        }
    }
}
