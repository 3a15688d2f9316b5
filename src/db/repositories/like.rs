//! Like repository
//!
//! One row per (post, user); the unique key makes `like` idempotent.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Returns false if the user already liked the post
    async fn like(&self, post_id: i64, user_id: i64) -> Result<bool>;

    /// Returns false if there was no like to remove
    async fn unlike(&self, post_id: i64, user_id: i64) -> Result<bool>;

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool>;

    async fn count(&self, post_id: i64) -> Result<i64>;
}

pub struct SqlxLikeRepository {
    pool: DynDatabasePool,
}

impl SqlxLikeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn like(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_LIKE_SQLITE)
                .bind(post_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to like post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_LIKE_MYSQL)
                .bind(post_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to like post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unlike(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_LIKE)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to unlike post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_LIKE)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to unlike post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(EXISTS_LIKE)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check like")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(EXISTS_LIKE)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check like")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn count(&self, post_id: i64) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(COUNT_LIKES)
                .bind(post_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count likes")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(COUNT_LIKES)
                .bind(post_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count likes")?
                .get("count"),
        };
        Ok(count)
    }
}

const INSERT_LIKE_SQLITE: &str =
    "INSERT OR IGNORE INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)";
const INSERT_LIKE_MYSQL: &str =
    "INSERT IGNORE INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)";
const DELETE_LIKE: &str = "DELETE FROM likes WHERE post_id = ? AND user_id = ?";
const EXISTS_LIKE: &str = "SELECT COUNT(*) as count FROM likes WHERE post_id = ? AND user_id = ?";
const COUNT_LIKES: &str = "SELECT COUNT(*) as count FROM likes WHERE post_id = ?";
