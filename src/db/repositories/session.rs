//! Session repository
//!
//! Sessions double as API tokens, so a user's live session can be looked
//! up and reused instead of issuing a new one on every login.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Most recently issued unexpired session of a user
    async fn get_active_for_user(&self, user_id: i64) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Remove expired sessions and return how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_session_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_active_for_user(&self, user_id: i64) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_active_session_sqlite(self.pool.sqlite()?, user_id).await
            }
            DatabaseDriver::Mysql => get_active_session_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(DELETE_SESSION)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete session")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(DELETE_SESSION)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(DELETE_USER_SESSIONS)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete user sessions")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(DELETE_USER_SESSIONS)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete user sessions")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_EXPIRED)
                .bind(Utc::now())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_EXPIRED)
                .bind(Utc::now())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

const INSERT_SESSION: &str =
    "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
const SELECT_SESSION: &str =
    "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";
const SELECT_ACTIVE_SESSION: &str = r#"
    SELECT id, user_id, expires_at, created_at
    FROM sessions
    WHERE user_id = ? AND expires_at > ?
    ORDER BY created_at DESC
    LIMIT 1
"#;
const DELETE_SESSION: &str = "DELETE FROM sessions WHERE id = ?";
const DELETE_USER_SESSIONS: &str = "DELETE FROM sessions WHERE user_id = ?";
const DELETE_EXPIRED: &str = "DELETE FROM sessions WHERE expires_at <= ?";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;
    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_SESSION)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;
    Ok(row.as_ref().map(row_to_session_sqlite))
}

async fn get_active_session_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_ACTIVE_SESSION)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
        .context("Failed to get active session")?;
    Ok(row.as_ref().map(row_to_session_sqlite))
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;
    Ok(session.clone())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_SESSION)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;
    Ok(row.as_ref().map(row_to_session_mysql))
}

async fn get_active_session_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_ACTIVE_SESSION)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
        .context("Failed to get active session")?;
    Ok(row.as_ref().map(row_to_session_mysql))
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Session {
    Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = setup_pool().await;
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    fn expired_session(user_id: i64) -> Session {
        let mut session = Session::issue(user_id, 1);
        session.expires_at = Utc::now() - Duration::hours(1);
        session
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = insert_user(&pool, "alice").await;

        let session = Session::issue(user_id, 7);
        repo.create(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_active_for_user_skips_expired() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = insert_user(&pool, "bob").await;

        repo.create(&expired_session(user_id)).await.unwrap();
        assert!(repo.get_active_for_user(user_id).await.unwrap().is_none());

        let live = Session::issue(user_id, 7);
        repo.create(&live).await.unwrap();
        let active = repo.get_active_for_user(user_id).await.unwrap().unwrap();
        assert_eq!(active.id, live.id);
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = insert_user(&pool, "carol").await;

        repo.create(&expired_session(user_id)).await.unwrap();
        repo.create(&expired_session(user_id)).await.unwrap();
        let live = Session::issue(user_id, 7);
        repo.create(&live).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 2);
        assert!(repo.get_by_id(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_user() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = insert_user(&pool, "dave").await;
        let first = Session::issue(user_id, 7);
        let second = Session::issue(user_id, 7);
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        repo.delete_by_user(user_id).await.unwrap();
        assert!(repo.get_by_id(&first.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&second.id).await.unwrap().is_none());
    }
}
