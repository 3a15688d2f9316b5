//! Notification repository
//!
//! The target is stored as a (`target_type`, `target_id`) pair so one
//! table can point at posts, comments or users.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewNotification, Notification, Target, TargetType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<i64>;

    /// A recipient's notifications, newest first
    async fn list_for_recipient(
        &self,
        recipient_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)>;

    async fn unread_count(&self, recipient_id: i64) -> Result<i64>;

    /// Mark one notification read; false unless it belongs to `recipient_id`
    async fn mark_read(&self, id: i64, recipient_id: i64) -> Result<bool>;

    /// Returns the number of notifications changed
    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<i64> {
        let target_type = notification.target.map(|t| t.kind.to_string());
        let target_id = notification.target.map(|t| t.id);
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_NOTIFICATION)
                .bind(notification.recipient_id)
                .bind(notification.actor_id)
                .bind(&notification.verb)
                .bind(&target_type)
                .bind(target_id)
                .bind(Utc::now())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create notification")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_NOTIFICATION)
                .bind(notification.recipient_id)
                .bind(notification.actor_id)
                .bind(&notification.verb)
                .bind(&target_type)
                .bind(target_id)
                .bind(Utc::now())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create notification")?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    async fn list_for_recipient(
        &self,
        recipient_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_notifications_sqlite(self.pool.sqlite()?, recipient_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_notifications_mysql(self.pool.mysql()?, recipient_id, params).await
            }
        }
    }

    async fn unread_count(&self, recipient_id: i64) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(COUNT_UNREAD)
                .bind(recipient_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(COUNT_UNREAD)
                .bind(recipient_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
        };
        Ok(count)
    }

    async fn mark_read(&self, id: i64, recipient_id: i64) -> Result<bool> {
        // Matching rows rather than changed rows, so re-reading one still succeeds.
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                sqlx::query(MARK_READ)
                    .bind(id)
                    .bind(recipient_id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification read")?;
                sqlx::query(COUNT_OWNED)
                    .bind(id)
                    .bind(recipient_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to check notification")?
                    .get("count")
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                sqlx::query(MARK_READ)
                    .bind(id)
                    .bind(recipient_id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification read")?;
                sqlx::query(COUNT_OWNED)
                    .bind(id)
                    .bind(recipient_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to check notification")?
                    .get("count")
            }
        };
        Ok(count > 0)
    }

    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(MARK_ALL_READ)
                .bind(recipient_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(MARK_ALL_READ)
                .bind(recipient_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(affected)
    }
}

const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (recipient_id, actor_id, verb, target_type, target_id, is_read, timestamp)
    VALUES (?, ?, ?, ?, ?, FALSE, ?)
"#;
const LIST_NOTIFICATIONS: &str = r#"
    SELECT n.id, n.recipient_id, n.actor_id, u.username AS actor_username, n.verb,
           n.target_type, n.target_id, n.is_read, n.timestamp
    FROM notifications n
    JOIN users u ON u.id = n.actor_id
    WHERE n.recipient_id = ?
    ORDER BY n.timestamp DESC, n.id DESC
    LIMIT ? OFFSET ?
"#;
const COUNT_NOTIFICATIONS: &str =
    "SELECT COUNT(*) as count FROM notifications WHERE recipient_id = ?";
const COUNT_UNREAD: &str =
    "SELECT COUNT(*) as count FROM notifications WHERE recipient_id = ? AND is_read = FALSE";
const COUNT_OWNED: &str =
    "SELECT COUNT(*) as count FROM notifications WHERE id = ? AND recipient_id = ?";
const MARK_READ: &str =
    "UPDATE notifications SET is_read = TRUE WHERE id = ? AND recipient_id = ?";
const MARK_ALL_READ: &str =
    "UPDATE notifications SET is_read = TRUE WHERE recipient_id = ? AND is_read = FALSE";

fn parse_target(kind: Option<String>, id: Option<i64>) -> Option<Target> {
    match (kind, id) {
        (Some(kind), Some(id)) => kind.parse::<TargetType>().ok().map(|kind| Target { kind, id }),
        _ => None,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_notifications_sqlite(
    pool: &SqlitePool,
    recipient_id: i64,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let rows = sqlx::query(LIST_NOTIFICATIONS)
        .bind(recipient_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;
    let total: i64 = sqlx::query(COUNT_NOTIFICATIONS)
        .bind(recipient_id)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?
        .get("count");
    Ok((rows.iter().map(row_to_notification_sqlite).collect(), total))
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Notification {
    Notification {
        id: row.get("id"),
        recipient_id: row.get("recipient_id"),
        actor_id: row.get("actor_id"),
        actor_username: row.get("actor_username"),
        verb: row.get("verb"),
        target: parse_target(row.get("target_type"), row.get("target_id")),
        is_read: row.get("is_read"),
        timestamp: row.get("timestamp"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_notifications_mysql(
    pool: &MySqlPool,
    recipient_id: i64,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let rows = sqlx::query(LIST_NOTIFICATIONS)
        .bind(recipient_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;
    let total: i64 = sqlx::query(COUNT_NOTIFICATIONS)
        .bind(recipient_id)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?
        .get("count");
    Ok((rows.iter().map(row_to_notification_mysql).collect(), total))
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Notification {
    Notification {
        id: row.get("id"),
        recipient_id: row.get("recipient_id"),
        actor_id: row.get("actor_id"),
        actor_username: row.get("actor_username"),
        verb: row.get("verb"),
        target: parse_target(row.get("target_type"), row.get("target_id")),
        is_read: row.get("is_read"),
        timestamp: row.get("timestamp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    fn notification(recipient_id: i64, actor_id: i64, verb: &str, target: Option<Target>) -> NewNotification {
        NewNotification {
            recipient_id,
            actor_id,
            verb: verb.to_string(),
            target,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let pool = setup_pool().await;
        let repo = SqlxNotificationRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        repo.create(&notification(alice, bob, "started following you", Some(Target::user(alice))))
            .await
            .unwrap();
        repo.create(&notification(alice, bob, "liked your post", Some(Target::post(7))))
            .await
            .unwrap();
        repo.create(&notification(bob, alice, "liked your post", None))
            .await
            .unwrap();

        let (items, total) = repo
            .list_for_recipient(alice, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].verb, "liked your post");
        assert_eq!(items[0].target, Some(Target::post(7)));
        assert_eq!(items[0].actor_username, "bob");
        assert!(!items[0].is_read);

        let (items, _) = repo.list_for_recipient(bob, &ListParams::default()).await.unwrap();
        assert_eq!(items[0].target, None);
    }

    #[tokio::test]
    async fn test_mark_read_only_own() {
        let pool = setup_pool().await;
        let repo = SqlxNotificationRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let id = repo
            .create(&notification(alice, bob, "liked your post", None))
            .await
            .unwrap();

        assert!(!repo.mark_read(id, bob).await.unwrap());
        assert_eq!(repo.unread_count(alice).await.unwrap(), 1);
        assert!(repo.mark_read(id, alice).await.unwrap());
        assert!(repo.mark_read(id, alice).await.unwrap());
        assert_eq!(repo.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let pool = setup_pool().await;
        let repo = SqlxNotificationRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        for _ in 0..3 {
            repo.create(&notification(alice, bob, "liked your post", None))
                .await
                .unwrap();
        }
        repo.create(&notification(bob, alice, "liked your post", None))
            .await
            .unwrap();

        assert_eq!(repo.mark_all_read(alice).await.unwrap(), 3);
        assert_eq!(repo.mark_all_read(alice).await.unwrap(), 0);
        assert_eq!(repo.unread_count(bob).await.unwrap(), 1);
    }
}
