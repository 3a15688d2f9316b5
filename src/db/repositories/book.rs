//! Book repository
//!
//! Every read joins `authors` so callers get the author's name alongside
//! the foreign key. List filters are bound as nullable parameters, so one
//! statement serves every combination of filters.

use crate::config::DatabaseDriver;
use crate::db::repositories::like_pattern;
use crate::db::DynDatabasePool;
use crate::models::{Book, BookFilter, CreateBookInput, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Binds `FilterBinds` in `FILTER_WHERE` placeholder order
macro_rules! bind_filter {
    ($query:expr, $binds:expr) => {
        $query
            .bind(&$binds.search)
            .bind(&$binds.search)
            .bind(&$binds.search)
            .bind(&$binds.title)
            .bind(&$binds.title)
            .bind($binds.author_id)
            .bind($binds.author_id)
            .bind(&$binds.author_name)
            .bind(&$binds.author_name)
            .bind($binds.year)
            .bind($binds.year)
            .bind($binds.min_year)
            .bind($binds.min_year)
            .bind($binds.max_year)
            .bind($binds.max_year)
    };
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, input: &CreateBookInput) -> Result<Book>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>>;

    /// Overwrite title, author and year; returns `None` if the book is gone
    async fn update(&self, book: &Book) -> Result<Option<Book>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered, ordered page of books plus the filtered total
    async fn list(&self, filter: &BookFilter, params: &ListParams) -> Result<(Vec<Book>, i64)>;

    /// All books by one author, by title
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Book>>;
}

pub struct SqlxBookRepository {
    pool: DynDatabasePool,
}

impl SqlxBookRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookRepository for SqlxBookRepository {
    async fn create(&self, input: &CreateBookInput) -> Result<Book> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_book_sqlite(self.pool.sqlite()?, input).await?,
            DatabaseDriver::Mysql => create_book_mysql(self.pool.mysql()?, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Book not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_book_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_book_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update(&self, book: &Book) -> Result<Option<Book>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_BOOK)
                    .bind(&book.title)
                    .bind(book.author_id)
                    .bind(book.publication_year)
                    .bind(Utc::now())
                    .bind(book.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update book")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_BOOK)
                    .bind(&book.title)
                    .bind(book.author_id)
                    .bind(book.publication_year)
                    .bind(Utc::now())
                    .bind(book.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update book")?;
            }
        }
        self.get_by_id(book.id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_BOOK)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete book")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_BOOK)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete book")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &BookFilter, params: &ListParams) -> Result<(Vec<Book>, i64)> {
        let binds = FilterBinds::from(filter);
        let select = format!(
            "SELECT {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            BOOK_COLUMNS,
            BOOK_FROM,
            FILTER_WHERE,
            filter.ordering.sql()
        );
        let count = format!("SELECT COUNT(*) as count {} WHERE {}", BOOK_FROM, FILTER_WHERE);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = bind_filter!(sqlx::query(&select), binds)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list books")?;
                let total: i64 = bind_filter!(sqlx::query(&count), binds)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count books")?
                    .get("count");
                Ok((rows.iter().map(row_to_book_sqlite).collect(), total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = bind_filter!(sqlx::query(&select), binds)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list books")?;
                let total: i64 = bind_filter!(sqlx::query(&count), binds)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count books")?
                    .get("count");
                Ok((rows.iter().map(row_to_book_mysql).collect(), total))
            }
        }
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Book>> {
        let sql = format!(
            "SELECT {} {} WHERE b.author_id = ? ORDER BY b.title, b.id",
            BOOK_COLUMNS, BOOK_FROM
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list books by author")?;
                Ok(rows.iter().map(row_to_book_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list books by author")?;
                Ok(rows.iter().map(row_to_book_mysql).collect())
            }
        }
    }
}

pub(crate) const BOOK_COLUMNS: &str = "b.id, b.title, b.author_id, a.name AS author_name, b.publication_year, b.created_at, b.updated_at";
pub(crate) const BOOK_FROM: &str = "FROM books b JOIN authors a ON a.id = b.author_id";

const INSERT_BOOK: &str = r#"
    INSERT INTO books (title, author_id, publication_year, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;
const UPDATE_BOOK: &str =
    "UPDATE books SET title = ?, author_id = ?, publication_year = ?, updated_at = ? WHERE id = ?";
const DELETE_BOOK: &str = "DELETE FROM books WHERE id = ?";

const FILTER_WHERE: &str = r#"
    (? IS NULL OR LOWER(b.title) LIKE ? ESCAPE '!' OR LOWER(a.name) LIKE ? ESCAPE '!')
    AND (? IS NULL OR b.title = ?)
    AND (? IS NULL OR b.author_id = ?)
    AND (? IS NULL OR LOWER(a.name) LIKE ? ESCAPE '!')
    AND (? IS NULL OR b.publication_year = ?)
    AND (? IS NULL OR b.publication_year >= ?)
    AND (? IS NULL OR b.publication_year <= ?)
"#;

/// Values bound into `FILTER_WHERE`, in placeholder order
struct FilterBinds {
    search: Option<String>,
    title: Option<String>,
    author_id: Option<i64>,
    author_name: Option<String>,
    year: Option<i32>,
    min_year: Option<i32>,
    max_year: Option<i32>,
}

impl From<&BookFilter> for FilterBinds {
    fn from(filter: &BookFilter) -> Self {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            search: non_empty(&filter.search).map(|s| like_pattern(&s)),
            title: non_empty(&filter.title),
            author_id: filter.author_id,
            author_name: non_empty(&filter.author_name).map(|s| like_pattern(&s)),
            year: filter.publication_year,
            min_year: filter.min_year,
            max_year: filter.max_year,
        }
    }
}


// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_book_sqlite(pool: &SqlitePool, input: &CreateBookInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_BOOK)
        .bind(&input.title)
        .bind(input.author_id)
        .bind(input.publication_year)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create book")?;
    Ok(result.last_insert_rowid())
}

async fn get_book_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Book>> {
    let sql = format!("SELECT {} {} WHERE b.id = ?", BOOK_COLUMNS, BOOK_FROM);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get book")?;
    Ok(row.as_ref().map(row_to_book_sqlite))
}

pub(crate) fn row_to_book_sqlite(row: &sqlx::sqlite::SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        publication_year: row.get("publication_year"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_book_mysql(pool: &MySqlPool, input: &CreateBookInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_BOOK)
        .bind(&input.title)
        .bind(input.author_id)
        .bind(input.publication_year)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create book")?;
    Ok(result.last_insert_id() as i64)
}

async fn get_book_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Book>> {
    let sql = format!("SELECT {} {} WHERE b.id = ?", BOOK_COLUMNS, BOOK_FROM);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get book")?;
    Ok(row.as_ref().map(row_to_book_mysql))
}

pub(crate) fn row_to_book_mysql(row: &sqlx::mysql::MySqlRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        publication_year: row.get("publication_year"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_author, setup_pool};
    use crate::models::BookOrdering;

    async fn seeded_repo() -> (SqlxBookRepository, i64, i64) {
        let pool = setup_pool().await;
        let repo = SqlxBookRepository::new(pool.clone());
        let orwell = insert_author(&pool, "George Orwell").await;
        let austen = insert_author(&pool, "Jane Austen").await;

        for (title, author, year) in [
            ("Nineteen Eighty-Four", orwell, 1949),
            ("Animal Farm", orwell, 1945),
            ("Pride and Prejudice", austen, 1813),
            ("Emma", austen, 1815),
        ] {
            repo.create(&CreateBookInput {
                title: title.to_string(),
                author_id: author,
                publication_year: year,
            })
            .await
            .unwrap();
        }
        (repo, orwell, austen)
    }

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_returns_author_name() {
        let (repo, orwell, _) = seeded_repo().await;
        let book = repo
            .create(&CreateBookInput {
                title: "Homage to Catalonia".to_string(),
                author_id: orwell,
                publication_year: 1938,
            })
            .await
            .unwrap();
        assert_eq!(book.author_name, "George Orwell");
        assert_eq!(book.publication_year, 1938);
    }

    #[tokio::test]
    async fn test_create_with_unknown_author_fails() {
        let (repo, _, _) = seeded_repo().await;
        let result = repo
            .create(&CreateBookInput {
                title: "Ghost".to_string(),
                author_id: 999,
                publication_year: 2000,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_unfiltered_by_id() {
        let (repo, _, _) = seeded_repo().await;
        let (books, total) = repo
            .list(&BookFilter::default(), &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(books[0].title, "Nineteen Eighty-Four");
    }

    #[tokio::test]
    async fn test_search_matches_title_or_author() {
        let (repo, _, _) = seeded_repo().await;
        let filter = BookFilter {
            search: Some("AUSTEN".to_string()),
            ..Default::default()
        };
        let (books, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(titles(&books), vec!["Pride and Prejudice", "Emma"]);

        let filter = BookFilter {
            search: Some("farm".to_string()),
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&books), vec!["Animal Farm"]);
    }

    #[tokio::test]
    async fn test_exact_and_range_filters() {
        let (repo, orwell, _) = seeded_repo().await;

        let filter = BookFilter {
            author_id: Some(orwell),
            min_year: Some(1946),
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&books), vec!["Nineteen Eighty-Four"]);

        let filter = BookFilter {
            title: Some("Emma".to_string()),
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&books), vec!["Emma"]);

        let filter = BookFilter {
            publication_year: Some(1813),
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&books), vec!["Pride and Prejudice"]);

        let filter = BookFilter {
            author_name: Some("orw".to_string()),
            max_year: Some(1945),
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&books), vec!["Animal Farm"]);
    }

    #[tokio::test]
    async fn test_ordering_and_paging() {
        let (repo, _, _) = seeded_repo().await;
        let filter = BookFilter {
            ordering: BookOrdering::YearDesc,
            ..Default::default()
        };
        let (books, total) = repo.list(&filter, &ListParams::new(2, 3)).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(titles(&books), vec!["Pride and Prejudice"]);

        let filter = BookFilter {
            ordering: BookOrdering::Title,
            ..Default::default()
        };
        let (books, _) = repo.list(&filter, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(titles(&books), vec!["Animal Farm", "Emma"]);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let (repo, _, _) = seeded_repo().await;
        let filter = BookFilter {
            search: Some("%".to_string()),
            ..Default::default()
        };
        let (_, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, _, austen) = seeded_repo().await;
        let mut book = repo.get_by_id(1).await.unwrap().unwrap();
        book.title = "1984".to_string();
        book.author_id = austen;

        let updated = repo.update(&book).await.unwrap().unwrap();
        assert_eq!(updated.title, "1984");
        assert_eq!(updated.author_name, "Jane Austen");
        assert_eq!(updated.publication_year, 1949);

        assert!(repo.delete(1).await.unwrap());
        assert!(repo.get_by_id(1).await.unwrap().is_none());
        book.id = 1;
        assert!(repo.update(&book).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_author() {
        let (repo, orwell, _) = seeded_repo().await;
        let books = repo.list_by_author(orwell).await.unwrap();
        assert_eq!(titles(&books), vec!["Animal Farm", "Nineteen Eighty-Four"]);
    }
}
