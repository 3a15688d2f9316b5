//! Library repository
//!
//! Covers libraries, their holdings (`library_books`) and the single
//! librarian assigned to each library.

use crate::config::DatabaseDriver;
use crate::db::repositories::book::{row_to_book_mysql, row_to_book_sqlite, BOOK_COLUMNS, BOOK_FROM};
use crate::db::DynDatabasePool;
use crate::models::{Book, Librarian, Library, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn create(&self, name: &str) -> Result<Library>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Library>>;

    /// Exact name match
    async fn get_by_name(&self, name: &str) -> Result<Option<Library>>;

    async fn rename(&self, id: i64, name: &str) -> Result<Option<Library>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Libraries ordered by name
    async fn list(&self, params: &ListParams) -> Result<(Vec<Library>, i64)>;

    /// Add a book to the holdings; returns false if it was already there
    async fn add_book(&self, library_id: i64, book_id: i64) -> Result<bool>;

    async fn remove_book(&self, library_id: i64, book_id: i64) -> Result<bool>;

    /// Holdings of a library, by title
    async fn books(&self, library_id: i64) -> Result<Vec<Book>>;

    async fn get_librarian(&self, library_id: i64) -> Result<Option<Librarian>>;

    /// Assign the librarian, replacing the name of any existing one
    async fn set_librarian(&self, library_id: i64, name: &str) -> Result<Librarian>;

    async fn remove_librarian(&self, library_id: i64) -> Result<bool>;
}

pub struct SqlxLibraryRepository {
    pool: DynDatabasePool,
}

impl SqlxLibraryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LibraryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn execute(&self, sql: &str, first: i64, second: Option<i64>, context: &'static str) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql).bind(first);
                if let Some(second) = second {
                    query = query.bind(second);
                }
                query.execute(self.pool.sqlite()?).await.context(context)?.rows_affected()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(sql).bind(first);
                if let Some(second) = second {
                    query = query.bind(second);
                }
                query.execute(self.pool.mysql()?).await.context(context)?.rows_affected()
            }
        };
        Ok(affected)
    }
}

#[async_trait]
impl LibraryRepository for SqlxLibraryRepository {
    async fn create(&self, name: &str) -> Result<Library> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_LIBRARY)
                .bind(name)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create library")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_LIBRARY)
                .bind(name)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create library")?
                .last_insert_id() as i64,
        };
        Ok(Library {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Library>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_LIBRARY_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get library")?;
                Ok(row.as_ref().map(row_to_library_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_LIBRARY_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get library")?;
                Ok(row.as_ref().map(row_to_library_mysql))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Library>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_LIBRARY_BY_NAME)
                    .bind(name)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get library by name")?;
                Ok(row.as_ref().map(row_to_library_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_LIBRARY_BY_NAME)
                    .bind(name)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get library by name")?;
                Ok(row.as_ref().map(row_to_library_mysql))
            }
        }
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Option<Library>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_LIBRARY)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to rename library")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_LIBRARY)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to rename library")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .execute(DELETE_LIBRARY, id, None, "Failed to delete library")
            .await?;
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Library>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_libraries_sqlite(self.pool.sqlite()?, params).await,
            DatabaseDriver::Mysql => list_libraries_mysql(self.pool.mysql()?, params).await,
        }
    }

    async fn add_book(&self, library_id: i64, book_id: i64) -> Result<bool> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => INSERT_HOLDING_SQLITE,
            DatabaseDriver::Mysql => INSERT_HOLDING_MYSQL,
        };
        let affected = self
            .execute(sql, library_id, Some(book_id), "Failed to add book to library")
            .await?;
        Ok(affected > 0)
    }

    async fn remove_book(&self, library_id: i64, book_id: i64) -> Result<bool> {
        let affected = self
            .execute(DELETE_HOLDING, library_id, Some(book_id), "Failed to remove book from library")
            .await?;
        Ok(affected > 0)
    }

    async fn books(&self, library_id: i64) -> Result<Vec<Book>> {
        let sql = format!(
            "SELECT {} {} JOIN library_books lb ON lb.book_id = b.id WHERE lb.library_id = ? ORDER BY b.title, b.id",
            BOOK_COLUMNS, BOOK_FROM
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(library_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list library books")?;
                Ok(rows.iter().map(row_to_book_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(library_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list library books")?;
                Ok(rows.iter().map(row_to_book_mysql).collect())
            }
        }
    }

    async fn get_librarian(&self, library_id: i64) -> Result<Option<Librarian>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_LIBRARIAN)
                    .bind(library_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get librarian")?;
                Ok(row.as_ref().map(row_to_librarian_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_LIBRARIAN)
                    .bind(library_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get librarian")?;
                Ok(row.as_ref().map(row_to_librarian_mysql))
            }
        }
    }

    async fn set_librarian(&self, library_id: i64, name: &str) -> Result<Librarian> {
        let existing = self.get_librarian(library_id).await?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                if existing.is_some() {
                    sqlx::query(UPDATE_LIBRARIAN)
                        .bind(name)
                        .bind(library_id)
                        .execute(pool)
                        .await
                        .context("Failed to update librarian")?;
                } else {
                    sqlx::query(INSERT_LIBRARIAN)
                        .bind(name)
                        .bind(library_id)
                        .bind(Utc::now())
                        .execute(pool)
                        .await
                        .context("Failed to create librarian")?;
                }
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                if existing.is_some() {
                    sqlx::query(UPDATE_LIBRARIAN)
                        .bind(name)
                        .bind(library_id)
                        .execute(pool)
                        .await
                        .context("Failed to update librarian")?;
                } else {
                    sqlx::query(INSERT_LIBRARIAN)
                        .bind(name)
                        .bind(library_id)
                        .bind(Utc::now())
                        .execute(pool)
                        .await
                        .context("Failed to create librarian")?;
                }
            }
        }
        self.get_librarian(library_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Librarian not found after save"))
    }

    async fn remove_librarian(&self, library_id: i64) -> Result<bool> {
        let affected = self
            .execute(DELETE_LIBRARIAN, library_id, None, "Failed to remove librarian")
            .await?;
        Ok(affected > 0)
    }
}

const SELECT_LIBRARY_BY_ID: &str = "SELECT id, name, created_at FROM libraries WHERE id = ?";
const SELECT_LIBRARY_BY_NAME: &str = "SELECT id, name, created_at FROM libraries WHERE name = ?";
const INSERT_LIBRARY: &str = "INSERT INTO libraries (name, created_at) VALUES (?, ?)";
const UPDATE_LIBRARY: &str = "UPDATE libraries SET name = ? WHERE id = ?";
const DELETE_LIBRARY: &str = "DELETE FROM libraries WHERE id = ?";
const LIST_LIBRARIES: &str =
    "SELECT id, name, created_at FROM libraries ORDER BY name, id LIMIT ? OFFSET ?";
const COUNT_LIBRARIES: &str = "SELECT COUNT(*) as count FROM libraries";

const INSERT_HOLDING_SQLITE: &str =
    "INSERT OR IGNORE INTO library_books (library_id, book_id) VALUES (?, ?)";
const INSERT_HOLDING_MYSQL: &str =
    "INSERT IGNORE INTO library_books (library_id, book_id) VALUES (?, ?)";
const DELETE_HOLDING: &str = "DELETE FROM library_books WHERE library_id = ? AND book_id = ?";

const SELECT_LIBRARIAN: &str =
    "SELECT id, name, library_id, created_at FROM librarians WHERE library_id = ?";
const INSERT_LIBRARIAN: &str =
    "INSERT INTO librarians (name, library_id, created_at) VALUES (?, ?, ?)";
const UPDATE_LIBRARIAN: &str = "UPDATE librarians SET name = ? WHERE library_id = ?";
const DELETE_LIBRARIAN: &str = "DELETE FROM librarians WHERE library_id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_libraries_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<(Vec<Library>, i64)> {
    let rows = sqlx::query(LIST_LIBRARIES)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list libraries")?;
    let total: i64 = sqlx::query(COUNT_LIBRARIES)
        .fetch_one(pool)
        .await
        .context("Failed to count libraries")?
        .get("count");
    Ok((rows.iter().map(row_to_library_sqlite).collect(), total))
}

fn row_to_library_sqlite(row: &sqlx::sqlite::SqliteRow) -> Library {
    Library {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn row_to_librarian_sqlite(row: &sqlx::sqlite::SqliteRow) -> Librarian {
    Librarian {
        id: row.get("id"),
        name: row.get("name"),
        library_id: row.get("library_id"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_libraries_mysql(
    pool: &MySqlPool,
    params: &ListParams,
) -> Result<(Vec<Library>, i64)> {
    let rows = sqlx::query(LIST_LIBRARIES)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list libraries")?;
    let total: i64 = sqlx::query(COUNT_LIBRARIES)
        .fetch_one(pool)
        .await
        .context("Failed to count libraries")?
        .get("count");
    Ok((rows.iter().map(row_to_library_mysql).collect(), total))
}

fn row_to_library_mysql(row: &sqlx::mysql::MySqlRow) -> Library {
    Library {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn row_to_librarian_mysql(row: &sqlx::mysql::MySqlRow) -> Librarian {
    Librarian {
        id: row.get("id"),
        name: row.get("name"),
        library_id: row.get("library_id"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_author, insert_book, setup_pool};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = setup_pool().await;
        let repo = SqlxLibraryRepository::new(pool);

        let library = repo.create("Central").await.unwrap();
        assert_eq!(repo.get_by_name("Central").await.unwrap().unwrap().id, library.id);
        assert!(repo.get_by_name("Branch").await.unwrap().is_none());
        assert!(repo.create("Central").await.is_err());

        let renamed = repo.rename(library.id, "Main").await.unwrap().unwrap();
        assert_eq!(renamed.name, "Main");
    }

    #[tokio::test]
    async fn test_holdings() {
        let pool = setup_pool().await;
        let repo = SqlxLibraryRepository::new(pool.clone());
        let author = insert_author(&pool, "Tolkien").await;
        let hobbit = insert_book(&pool, "The Hobbit", author, 1937).await;
        let silmarillion = insert_book(&pool, "Silmarillion", author, 1977).await;
        let library = repo.create("Central").await.unwrap();

        assert!(repo.add_book(library.id, hobbit).await.unwrap());
        assert!(!repo.add_book(library.id, hobbit).await.unwrap());
        assert!(repo.add_book(library.id, silmarillion).await.unwrap());

        let titles: Vec<String> = repo
            .books(library.id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Silmarillion", "The Hobbit"]);

        assert!(repo.remove_book(library.id, hobbit).await.unwrap());
        assert!(!repo.remove_book(library.id, hobbit).await.unwrap());
        assert_eq!(repo.books(library.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_librarian_is_replaced_not_duplicated() {
        let pool = setup_pool().await;
        let repo = SqlxLibraryRepository::new(pool);
        let library = repo.create("Central").await.unwrap();

        assert!(repo.get_librarian(library.id).await.unwrap().is_none());
        let first = repo.set_librarian(library.id, "Ada").await.unwrap();
        let second = repo.set_librarian(library.id, "Grace").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Grace");

        assert!(repo.remove_librarian(library.id).await.unwrap());
        assert!(repo.get_librarian(library.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let pool = setup_pool().await;
        let repo = SqlxLibraryRepository::new(pool.clone());
        let author = insert_author(&pool, "Le Guin").await;
        let book = insert_book(&pool, "Earthsea", author, 1968).await;
        let library = repo.create("Central").await.unwrap();
        repo.add_book(library.id, book).await.unwrap();
        repo.set_librarian(library.id, "Ada").await.unwrap();

        assert!(repo.delete(library.id).await.unwrap());
        let holdings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM library_books")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(holdings, 0);
        assert!(repo.get_librarian(library.id).await.unwrap().is_none());

        let (libraries, total) = repo.list(&ListParams::default()).await.unwrap();
        assert!(libraries.is_empty());
        assert_eq!(total, 0);
    }
}
