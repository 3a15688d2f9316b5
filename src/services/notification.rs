//! Notification service
//!
//! Notifications are side effects of likes, comments and follows. Creating
//! one never fails the action that caused it: `notify_quietly` logs and
//! swallows storage errors.

use crate::db::repositories::NotificationRepository;
use crate::models::{ListParams, NewNotification, Notification, PagedResult, Target};
use anyhow::Context;
use std::sync::Arc;

pub const VERB_LIKED_POST: &str = "liked your post";
pub const VERB_COMMENTED_POST: &str = "commented on your post";
pub const VERB_FOLLOWED: &str = "started following you";

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Notification not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A page of notifications plus the recipient's unread total
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: PagedResult<Notification>,
    pub unread_count: i64,
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Record "`actor` `verb` `target`" for `recipient`
    ///
    /// Returns `None` without storing anything when the actor is the
    /// recipient.
    pub async fn notify(
        &self,
        actor_id: i64,
        recipient_id: i64,
        verb: &str,
        target: Option<Target>,
    ) -> Result<Option<i64>, NotificationServiceError> {
        if actor_id == recipient_id {
            return Ok(None);
        }
        let id = self
            .repo
            .create(&NewNotification {
                recipient_id,
                actor_id,
                verb: verb.to_string(),
                target,
            })
            .await
            .context("Failed to store notification")?;
        Ok(Some(id))
    }

    /// `notify`, logging failures instead of returning them
    pub async fn notify_quietly(
        &self,
        actor_id: i64,
        recipient_id: i64,
        verb: &str,
        target: Option<Target>,
    ) {
        if let Err(e) = self.notify(actor_id, recipient_id, verb, target).await {
            tracing::warn!(
                actor_id,
                recipient_id,
                verb,
                "Failed to create notification: {}",
                e
            );
        }
    }

    pub async fn list(
        &self,
        recipient_id: i64,
        params: &ListParams,
    ) -> Result<NotificationPage, NotificationServiceError> {
        let (items, total) = self
            .repo
            .list_for_recipient(recipient_id, params)
            .await
            .context("Failed to list notifications")?;
        let unread_count = self
            .repo
            .unread_count(recipient_id)
            .await
            .context("Failed to count unread notifications")?;
        Ok(NotificationPage {
            page: PagedResult::new(items, total, params),
            unread_count,
        })
    }

    pub async fn unread_count(&self, recipient_id: i64) -> Result<i64, NotificationServiceError> {
        Ok(self
            .repo
            .unread_count(recipient_id)
            .await
            .context("Failed to count unread notifications")?)
    }

    /// Mark one of the recipient's notifications read
    ///
    /// Someone else's notification is reported as `NotFound`.
    pub async fn mark_read(&self, recipient_id: i64, id: i64) -> Result<(), NotificationServiceError> {
        let owned = self
            .repo
            .mark_read(id, recipient_id)
            .await
            .context("Failed to mark notification read")?;
        if owned {
            Ok(())
        } else {
            Err(NotificationServiceError::NotFound)
        }
    }

    pub async fn mark_all_read(&self, recipient_id: i64) -> Result<u64, NotificationServiceError> {
        Ok(self
            .repo
            .mark_all_read(recipient_id)
            .await
            .context("Failed to mark notifications read")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::SqlxNotificationRepository;
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, NotificationService) {
        let pool = setup_pool().await;
        let service = NotificationService::new(SqlxNotificationRepository::boxed(pool.clone()));
        (pool, service)
    }

    #[tokio::test]
    async fn test_self_notification_is_skipped() {
        let (pool, service) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;

        let id = service
            .notify(alice, alice, VERB_LIKED_POST, Some(Target::post(1)))
            .await
            .unwrap();
        assert!(id.is_none());
        assert_eq!(service.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_includes_unread_count() {
        let (pool, service) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        service.notify(bob, alice, VERB_FOLLOWED, Some(Target::user(alice))).await.unwrap();
        let liked = service
            .notify(bob, alice, VERB_LIKED_POST, Some(Target::post(3)))
            .await
            .unwrap()
            .unwrap();
        service.mark_read(alice, liked).await.unwrap();

        let page = service.list(alice, &ListParams::default()).await.unwrap();
        assert_eq!(page.page.total, 2);
        assert_eq!(page.unread_count, 1);
        assert_eq!(page.page.items[0].verb, VERB_LIKED_POST);
        assert!(page.page.items[0].is_read);
    }

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification_is_not_found() {
        let (pool, service) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let id = service
            .notify(bob, alice, VERB_COMMENTED_POST, None)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            service.mark_read(bob, id).await,
            Err(NotificationServiceError::NotFound)
        ));
        assert_eq!(service.mark_all_read(alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_notify_quietly_swallows_errors() {
        let (pool, service) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        // Unknown actor violates the foreign key; the call must not panic.
        service.notify_quietly(999, alice, VERB_FOLLOWED, None).await;
        assert_eq!(service.unread_count(alice).await.unwrap(), 0);
    }
}
