//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, post_id: i64, author_id: i64, content: &str) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    async fn update_content(&self, id: i64, content: &str) -> Result<Option<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Comments oldest first, optionally limited to one post
    async fn list(&self, post_id: Option<i64>, params: &ListParams) -> Result<(Vec<Comment>, i64)>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, post_id: i64, author_id: i64, content: &str) -> Result<Comment> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_COMMENT)
                .bind(post_id)
                .bind(author_id)
                .bind(content)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_COMMENT)
                .bind(post_id)
                .bind(author_id)
                .bind(content)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_comment_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_comment_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_COMMENT)
                    .bind(content)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_COMMENT)
                    .bind(content)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update comment")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_COMMENT)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_COMMENT)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, post_id: Option<i64>, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_comments_sqlite(self.pool.sqlite()?, post_id, params).await,
            DatabaseDriver::Mysql => list_comments_mysql(self.pool.mysql()?, post_id, params).await,
        }
    }
}

const SELECT_COMMENT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.content,
           c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
    WHERE c.id = ?
"#;
const LIST_COMMENTS: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.content,
           c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
    WHERE (? IS NULL OR c.post_id = ?)
    ORDER BY c.created_at ASC, c.id ASC
    LIMIT ? OFFSET ?
"#;
const COUNT_COMMENTS: &str =
    "SELECT COUNT(*) as count FROM comments c WHERE (? IS NULL OR c.post_id = ?)";
const INSERT_COMMENT: &str = r#"
    INSERT INTO comments (post_id, author_id, content, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;
const UPDATE_COMMENT: &str = "UPDATE comments SET content = ?, updated_at = ? WHERE id = ?";
const DELETE_COMMENT: &str = "DELETE FROM comments WHERE id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(SELECT_COMMENT)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn list_comments_sqlite(
    pool: &SqlitePool,
    post_id: Option<i64>,
    params: &ListParams,
) -> Result<(Vec<Comment>, i64)> {
    let rows = sqlx::query(LIST_COMMENTS)
        .bind(post_id)
        .bind(post_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    let total: i64 = sqlx::query(COUNT_COMMENTS)
        .bind(post_id)
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");
    Ok((rows.iter().map(row_to_comment_sqlite).collect(), total))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_comment_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(SELECT_COMMENT)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_mysql))
}

async fn list_comments_mysql(
    pool: &MySqlPool,
    post_id: Option<i64>,
    params: &ListParams,
) -> Result<(Vec<Comment>, i64)> {
    let rows = sqlx::query(LIST_COMMENTS)
        .bind(post_id)
        .bind(post_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    let total: i64 = sqlx::query(COUNT_COMMENTS)
        .bind(post_id)
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");
    Ok((rows.iter().map(row_to_comment_mysql).collect(), total))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_post, insert_user, setup_pool};

    #[tokio::test]
    async fn test_create_and_update() {
        let pool = setup_pool().await;
        let repo = SqlxCommentRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let post = insert_post(&pool, alice, "Hello").await;

        let comment = repo.create(post, alice, "Nice").await.unwrap();
        assert_eq!(comment.author_username, "alice");
        assert_eq!(comment.post_id, post);

        let updated = repo.update_content(comment.id, "Nicer").await.unwrap().unwrap();
        assert_eq!(updated.content, "Nicer");
        assert!(repo.update_content(999, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_oldest_first_with_post_filter() {
        let pool = setup_pool().await;
        let repo = SqlxCommentRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let first = insert_post(&pool, alice, "First").await;
        let second = insert_post(&pool, alice, "Second").await;

        repo.create(first, alice, "one").await.unwrap();
        repo.create(second, alice, "two").await.unwrap();
        repo.create(first, alice, "three").await.unwrap();

        let (all, total) = repo.list(None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].content, "one");

        let (on_first, total) = repo.list(Some(first), &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        let contents: Vec<_> = on_first.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_delete_and_cascade_from_post() {
        let pool = setup_pool().await;
        let repo = SqlxCommentRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let post = insert_post(&pool, alice, "Hello").await;
        let a = repo.create(post, alice, "a").await.unwrap();
        let b = repo.create(post, alice, "b").await.unwrap();

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert!(repo.get_by_id(b.id).await.unwrap().is_none());
    }
}
