//! Follow repository
//!
//! Stores the directed "follower follows followed" relation between users.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::UserSummary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Record the relation; returns false if it already existed
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Remove the relation; returns false if there was none
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Users following `user_id`, oldest first
    async fn followers(&self, user_id: i64) -> Result<Vec<UserSummary>>;

    /// Users that `user_id` follows, oldest first
    async fn following(&self, user_id: i64) -> Result<Vec<UserSummary>>;

    /// (followers, following) counts
    async fn counts(&self, user_id: i64) -> Result<(i64, i64)>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_FOLLOW_SQLITE)
                .bind(follower_id)
                .bind(followed_id)
                .bind(Utc::now())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to follow user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_FOLLOW_MYSQL)
                .bind(follower_id)
                .bind(followed_id)
                .bind(Utc::now())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to follow user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_FOLLOW)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_FOLLOW)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(EXISTS_FOLLOW)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check follow")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(EXISTS_FOLLOW)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check follow")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn followers(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_summaries_sqlite(self.pool.sqlite()?, SELECT_FOLLOWERS, user_id).await
            }
            DatabaseDriver::Mysql => {
                list_summaries_mysql(self.pool.mysql()?, SELECT_FOLLOWERS, user_id).await
            }
        }
    }

    async fn following(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_summaries_sqlite(self.pool.sqlite()?, SELECT_FOLLOWING, user_id).await
            }
            DatabaseDriver::Mysql => {
                list_summaries_mysql(self.pool.mysql()?, SELECT_FOLLOWING, user_id).await
            }
        }
    }

    async fn counts(&self, user_id: i64) -> Result<(i64, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(COUNT_FOLLOWS)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count follows")?;
                Ok((row.get("followers"), row.get("following")))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(COUNT_FOLLOWS)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count follows")?;
                Ok((row.get("followers"), row.get("following")))
            }
        }
    }
}

const INSERT_FOLLOW_SQLITE: &str =
    "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)";
const INSERT_FOLLOW_MYSQL: &str =
    "INSERT IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)";
const DELETE_FOLLOW: &str = "DELETE FROM follows WHERE follower_id = ? AND followed_id = ?";
const EXISTS_FOLLOW: &str =
    "SELECT COUNT(*) as count FROM follows WHERE follower_id = ? AND followed_id = ?";
const SELECT_FOLLOWERS: &str = r#"
    SELECT u.id, u.username
    FROM follows f
    JOIN users u ON u.id = f.follower_id
    WHERE f.followed_id = ?
    ORDER BY f.id
"#;
const SELECT_FOLLOWING: &str = r#"
    SELECT u.id, u.username
    FROM follows f
    JOIN users u ON u.id = f.followed_id
    WHERE f.follower_id = ?
    ORDER BY f.id
"#;
const COUNT_FOLLOWS: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM follows WHERE followed_id = ?) as followers,
        (SELECT COUNT(*) FROM follows WHERE follower_id = ?) as following
"#;

async fn list_summaries_sqlite(
    pool: &SqlitePool,
    sql: &str,
    user_id: i64,
) -> Result<Vec<UserSummary>> {
    let rows = sqlx::query(sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list follows")?;
    Ok(rows
        .iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
        })
        .collect())
}

async fn list_summaries_mysql(
    pool: &MySqlPool,
    sql: &str,
    user_id: i64,
) -> Result<Vec<UserSummary>> {
    let rows = sqlx::query(sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list follows")?;
    Ok(rows
        .iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
        })
        .collect())
}
