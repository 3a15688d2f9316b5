//! Library service
//!
//! Libraries, their holdings and their librarian, plus the by-name lookups
//! used by the lookup endpoints.

use crate::db::repositories::{BookRepository, LibraryRepository};
use crate::models::{Book, Librarian, Library, LibraryDetail, ListParams, PagedResult};
use anyhow::Context;
use std::sync::Arc;

pub const NAME_MAX_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum LibraryServiceError {
    /// Names what was missing: library, book or librarian
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl LibraryServiceError {
    fn not_found(what: &str) -> Self {
        Self::NotFound(what.to_string())
    }
}

pub struct LibraryService {
    library_repo: Arc<dyn LibraryRepository>,
    book_repo: Arc<dyn BookRepository>,
}

impl LibraryService {
    pub fn new(library_repo: Arc<dyn LibraryRepository>, book_repo: Arc<dyn BookRepository>) -> Self {
        Self {
            library_repo,
            book_repo,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Library>, LibraryServiceError> {
        let (libraries, total) = self
            .library_repo
            .list(params)
            .await
            .context("Failed to list libraries")?;
        Ok(PagedResult::new(libraries, total, params))
    }

    /// Library with its holdings and librarian
    pub async fn get(&self, id: i64) -> Result<LibraryDetail, LibraryServiceError> {
        let library = self.library(id).await?;
        self.detail(library).await
    }

    pub async fn create(&self, name: &str) -> Result<Library, LibraryServiceError> {
        let name = validate_name(name)?;
        self.ensure_name_free(&name, None).await?;
        let library = self
            .library_repo
            .create(&name)
            .await
            .context("Failed to create library")?;
        tracing::info!(library_id = library.id, "Created library {}", library.name);
        Ok(library)
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Library, LibraryServiceError> {
        let name = validate_name(name)?;
        self.ensure_name_free(&name, Some(id)).await?;
        self.library_repo
            .rename(id, &name)
            .await
            .context("Failed to rename library")?
            .ok_or_else(|| LibraryServiceError::not_found("Library"))
    }

    pub async fn delete(&self, id: i64) -> Result<(), LibraryServiceError> {
        let deleted = self
            .library_repo
            .delete(id)
            .await
            .context("Failed to delete library")?;
        if deleted {
            Ok(())
        } else {
            Err(LibraryServiceError::not_found("Library"))
        }
    }

    /// Add a book to the holdings; adding one already held is a no-op
    pub async fn add_book(&self, library_id: i64, book_id: i64) -> Result<LibraryDetail, LibraryServiceError> {
        let library = self.library(library_id).await?;
        self.book(book_id).await?;
        self.library_repo
            .add_book(library.id, book_id)
            .await
            .context("Failed to add book to library")?;
        self.detail(library).await
    }

    pub async fn remove_book(&self, library_id: i64, book_id: i64) -> Result<LibraryDetail, LibraryServiceError> {
        let library = self.library(library_id).await?;
        let removed = self
            .library_repo
            .remove_book(library.id, book_id)
            .await
            .context("Failed to remove book from library")?;
        if !removed {
            return Err(LibraryServiceError::not_found("Book"));
        }
        self.detail(library).await
    }

    /// Assign the librarian, replacing the current one
    pub async fn set_librarian(&self, library_id: i64, name: &str) -> Result<Librarian, LibraryServiceError> {
        let name = validate_name(name)?;
        let library = self.library(library_id).await?;
        Ok(self
            .library_repo
            .set_librarian(library.id, &name)
            .await
            .context("Failed to set librarian")?)
    }

    pub async fn remove_librarian(&self, library_id: i64) -> Result<(), LibraryServiceError> {
        let library = self.library(library_id).await?;
        let removed = self
            .library_repo
            .remove_librarian(library.id)
            .await
            .context("Failed to remove librarian")?;
        if removed {
            Ok(())
        } else {
            Err(LibraryServiceError::not_found("Librarian"))
        }
    }

    /// Holdings of the library with exactly this name
    pub async fn books_in_library(&self, name: &str) -> Result<Vec<Book>, LibraryServiceError> {
        let library = self.library_named(name).await?;
        Ok(self
            .library_repo
            .books(library.id)
            .await
            .context("Failed to list library books")?)
    }

    /// Librarian of the library with exactly this name
    pub async fn librarian_for_library(&self, name: &str) -> Result<Librarian, LibraryServiceError> {
        let library = self.library_named(name).await?;
        self.library_repo
            .get_librarian(library.id)
            .await
            .context("Failed to get librarian")?
            .ok_or_else(|| LibraryServiceError::not_found("Librarian"))
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    async fn library(&self, id: i64) -> Result<Library, LibraryServiceError> {
        self.library_repo
            .get_by_id(id)
            .await
            .context("Failed to get library")?
            .ok_or_else(|| LibraryServiceError::not_found("Library"))
    }

    async fn library_named(&self, name: &str) -> Result<Library, LibraryServiceError> {
        self.library_repo
            .get_by_name(name.trim())
            .await
            .context("Failed to get library by name")?
            .ok_or_else(|| LibraryServiceError::not_found("Library"))
    }

    async fn book(&self, id: i64) -> Result<Book, LibraryServiceError> {
        self.book_repo
            .get_by_id(id)
            .await
            .context("Failed to get book")?
            .ok_or_else(|| LibraryServiceError::not_found("Book"))
    }

    async fn detail(&self, library: Library) -> Result<LibraryDetail, LibraryServiceError> {
        let books = self
            .library_repo
            .books(library.id)
            .await
            .context("Failed to list library books")?;
        let librarian = self
            .library_repo
            .get_librarian(library.id)
            .await
            .context("Failed to get librarian")?;
        Ok(LibraryDetail {
            library,
            books,
            librarian,
        })
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), LibraryServiceError> {
        let existing = self
            .library_repo
            .get_by_name(name)
            .await
            .context("Failed to check library name")?;
        match existing {
            Some(other) if Some(other.id) != except => Err(LibraryServiceError::ValidationError {
                field: "name".to_string(),
                message: "library with this name already exists.".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn validate_name(name: &str) -> Result<String, LibraryServiceError> {
    let name = name.trim();
    let message = if name.is_empty() {
        "This field is required.".to_string()
    } else if name.chars().count() > NAME_MAX_LEN {
        format!("Ensure this field has no more than {} characters.", NAME_MAX_LEN)
    } else {
        return Ok(name.to_string());
    };
    Err(LibraryServiceError::ValidationError {
        field: "name".to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_author, insert_book, setup_pool};
    use crate::db::repositories::{SqlxBookRepository, SqlxLibraryRepository};
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, LibraryService) {
        let pool = setup_pool().await;
        let service = LibraryService::new(
            SqlxLibraryRepository::boxed(pool.clone()),
            SqlxBookRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let (_pool, service) = setup_test_service().await;
        service.create("Central").await.unwrap();
        assert!(matches!(
            service.create(" Central ").await,
            Err(LibraryServiceError::ValidationError { ref field, .. }) if field == "name"
        ));

        let branch = service.create("Branch").await.unwrap();
        assert!(service.rename(branch.id, "Central").await.is_err());
        assert_eq!(service.rename(branch.id, "Branch").await.unwrap().name, "Branch");
    }

    #[tokio::test]
    async fn test_holdings_and_detail() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Tolkien").await;
        let hobbit = insert_book(&pool, "The Hobbit", author, 1937).await;
        let library = service.create("Central").await.unwrap();

        service.add_book(library.id, hobbit).await.unwrap();
        let detail = service.add_book(library.id, hobbit).await.unwrap();
        assert_eq!(detail.books.len(), 1);
        assert_eq!(detail.books[0].author_name, "Tolkien");
        assert!(detail.librarian.is_none());

        assert!(matches!(
            service.add_book(library.id, 999).await,
            Err(LibraryServiceError::NotFound(ref what)) if what == "Book"
        ));

        let detail = service.remove_book(library.id, hobbit).await.unwrap();
        assert!(detail.books.is_empty());
        assert!(service.remove_book(library.id, hobbit).await.is_err());
    }

    #[tokio::test]
    async fn test_librarian_assignment() {
        let (_pool, service) = setup_test_service().await;
        let library = service.create("Central").await.unwrap();

        let first = service.set_librarian(library.id, "Ada").await.unwrap();
        let second = service.set_librarian(library.id, "Grace").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(service.librarian_for_library("Central").await.unwrap().name, "Grace");

        service.remove_librarian(library.id).await.unwrap();
        assert!(matches!(
            service.librarian_for_library("Central").await,
            Err(LibraryServiceError::NotFound(ref what)) if what == "Librarian"
        ));
        assert!(service.remove_librarian(library.id).await.is_err());
    }

    #[tokio::test]
    async fn test_named_lookups_use_exact_names() {
        let (pool, service) = setup_test_service().await;
        let author = insert_author(&pool, "Tolkien").await;
        let book = insert_book(&pool, "The Hobbit", author, 1937).await;
        let library = service.create("Central").await.unwrap();
        service.add_book(library.id, book).await.unwrap();

        assert_eq!(service.books_in_library("Central").await.unwrap().len(), 1);
        assert!(matches!(
            service.books_in_library("Cent").await,
            Err(LibraryServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_pool, service) = setup_test_service().await;
        let library = service.create("Central").await.unwrap();
        service.delete(library.id).await.unwrap();
        assert!(service.get(library.id).await.is_err());
        assert!(service.delete(library.id).await.is_err());
    }
}
