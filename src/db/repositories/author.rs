//! Author repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Author, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create(&self, name: &str) -> Result<Author>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    /// First author with exactly this name
    async fn get_by_name(&self, name: &str) -> Result<Option<Author>>;

    async fn rename(&self, id: i64, name: &str) -> Result<Option<Author>>;

    /// Delete an author and, through the foreign key, their books
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Authors ordered by name
    async fn list(&self, params: &ListParams) -> Result<(Vec<Author>, i64)>;
}

pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, name: &str) -> Result<Author> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_AUTHOR)
                .bind(name)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create author")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_AUTHOR)
                .bind(name)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create author")?
                .last_insert_id() as i64,
        };
        Ok(Author {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_AUTHOR_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get author")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_AUTHOR_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get author")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Author>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_AUTHOR_BY_NAME)
                    .bind(name)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get author by name")?;
                Ok(row.as_ref().map(row_to_author_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_AUTHOR_BY_NAME)
                    .bind(name)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get author by name")?;
                Ok(row.as_ref().map(row_to_author_mysql))
            }
        }
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Option<Author>> {
        // MySQL reports 0 affected rows for an unchanged name, so re-read instead.
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_AUTHOR)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update author")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_AUTHOR)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update author")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_AUTHOR)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete author")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_AUTHOR)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete author")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Author>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_authors_sqlite(self.pool.sqlite()?, params).await,
            DatabaseDriver::Mysql => list_authors_mysql(self.pool.mysql()?, params).await,
        }
    }
}

const SELECT_AUTHOR_BY_ID: &str = "SELECT id, name, created_at FROM authors WHERE id = ?";
const SELECT_AUTHOR_BY_NAME: &str =
    "SELECT id, name, created_at FROM authors WHERE name = ? ORDER BY id LIMIT 1";
const INSERT_AUTHOR: &str = "INSERT INTO authors (name, created_at) VALUES (?, ?)";
const UPDATE_AUTHOR: &str = "UPDATE authors SET name = ? WHERE id = ?";
const DELETE_AUTHOR: &str = "DELETE FROM authors WHERE id = ?";
const LIST_AUTHORS: &str =
    "SELECT id, name, created_at FROM authors ORDER BY name, id LIMIT ? OFFSET ?";
const COUNT_AUTHORS: &str = "SELECT COUNT(*) as count FROM authors";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_authors_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<(Vec<Author>, i64)> {
    let rows = sqlx::query(LIST_AUTHORS)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list authors")?;
    let total: i64 = sqlx::query(COUNT_AUTHORS)
        .fetch_one(pool)
        .await
        .context("Failed to count authors")?
        .get("count");
    Ok((rows.iter().map(row_to_author_sqlite).collect(), total))
}

fn row_to_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_authors_mysql(pool: &MySqlPool, params: &ListParams) -> Result<(Vec<Author>, i64)> {
    let rows = sqlx::query(LIST_AUTHORS)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list authors")?;
    let total: i64 = sqlx::query(COUNT_AUTHORS)
        .fetch_one(pool)
        .await
        .context("Failed to count authors")?
        .get("count");
    Ok((rows.iter().map(row_to_author_mysql).collect(), total))
}

fn row_to_author_mysql(row: &sqlx::mysql::MySqlRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_book, setup_pool};

    #[tokio::test]
    async fn test_create_get_and_rename() {
        let pool = setup_pool().await;
        let repo = SqlxAuthorRepository::new(pool);

        let author = repo.create("Ursula K. Le Guin").await.unwrap();
        assert!(author.id > 0);
        assert_eq!(
            repo.get_by_name("Ursula K. Le Guin").await.unwrap().unwrap().id,
            author.id
        );

        let renamed = repo.rename(author.id, "U. K. Le Guin").await.unwrap().unwrap();
        assert_eq!(renamed.name, "U. K. Le Guin");
        assert!(repo.rename(999, "Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let pool = setup_pool().await;
        let repo = SqlxAuthorRepository::new(pool);
        for name in ["Tolkien", "Austen", "Morrison"] {
            repo.create(name).await.unwrap();
        }

        let (authors, total) = repo.list(&ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = authors.into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Austen", "Morrison"]);
    }

    #[tokio::test]
    async fn test_delete_removes_books() {
        let pool = setup_pool().await;
        let repo = SqlxAuthorRepository::new(pool.clone());
        let author = repo.create("Herbert").await.unwrap();
        insert_book(&pool, "Dune", author.id, 1965).await;

        assert!(repo.delete(author.id).await.unwrap());
        assert!(!repo.delete(author.id).await.unwrap());

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(books, 0);
    }
}
