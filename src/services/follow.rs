//! Follow service
//!
//! Following is idempotent in both directions. Only the follow that
//! actually creates the relation notifies the followed user.

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{Target, User, UserSummary};
use crate::services::notification::{NotificationService, VERB_FOLLOWED};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    #[error("User not found")]
    NotFound,

    /// Following or unfollowing yourself
    #[error("{0}")]
    SelfFollow(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FollowService {
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
}

impl FollowService {
    pub fn new(
        follow_repo: Arc<dyn FollowRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            notifications,
        }
    }

    /// Follow `target_id`; returns the followed user
    pub async fn follow(&self, follower_id: i64, target_id: i64) -> Result<User, FollowServiceError> {
        let target = self.target(target_id).await?;
        if follower_id == target.id {
            return Err(FollowServiceError::SelfFollow(
                "You cannot follow yourself.".to_string(),
            ));
        }

        let created = self
            .follow_repo
            .follow(follower_id, target.id)
            .await
            .context("Failed to follow user")?;
        if created {
            self.notifications
                .notify_quietly(follower_id, target.id, VERB_FOLLOWED, Some(Target::user(target.id)))
                .await;
        }
        Ok(target)
    }

    /// Stop following `target_id`; returns the unfollowed user
    pub async fn unfollow(&self, follower_id: i64, target_id: i64) -> Result<User, FollowServiceError> {
        let target = self.target(target_id).await?;
        if follower_id == target.id {
            return Err(FollowServiceError::SelfFollow(
                "You cannot unfollow yourself.".to_string(),
            ));
        }

        self.follow_repo
            .unfollow(follower_id, target.id)
            .await
            .context("Failed to unfollow user")?;
        Ok(target)
    }

    pub async fn is_following(&self, follower_id: i64, target_id: i64) -> Result<bool, FollowServiceError> {
        Ok(self
            .follow_repo
            .is_following(follower_id, target_id)
            .await
            .context("Failed to check follow")?)
    }

    /// Users following `user_id`
    pub async fn followers(&self, user_id: i64) -> Result<Vec<UserSummary>, FollowServiceError> {
        self.target(user_id).await?;
        Ok(self
            .follow_repo
            .followers(user_id)
            .await
            .context("Failed to list followers")?)
    }

    /// Users `user_id` follows
    pub async fn following(&self, user_id: i64) -> Result<Vec<UserSummary>, FollowServiceError> {
        self.target(user_id).await?;
        Ok(self
            .follow_repo
            .following(user_id)
            .await
            .context("Failed to list followed users")?)
    }

    async fn target(&self, user_id: i64) -> Result<User, FollowServiceError> {
        self.user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(FollowServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{SqlxFollowRepository, SqlxNotificationRepository, SqlxUserRepository};
    use crate::db::DynDatabasePool;
    use crate::models::ListParams;

    async fn setup_test_service() -> (DynDatabasePool, FollowService, Arc<NotificationService>) {
        let pool = setup_pool().await;
        let notifications = Arc::new(NotificationService::new(SqlxNotificationRepository::boxed(
            pool.clone(),
        )));
        let service = FollowService::new(
            SqlxFollowRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            notifications.clone(),
        );
        (pool, service, notifications)
    }

    #[tokio::test]
    async fn test_follow_is_idempotent_and_notifies_once() {
        let (pool, service, notifications) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        let followed = service.follow(bob, alice).await.unwrap();
        assert_eq!(followed.username, "alice");
        service.follow(bob, alice).await.unwrap();

        assert!(service.is_following(bob, alice).await.unwrap());
        let followers = service.followers(alice).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "bob");

        let page = notifications.list(alice, &ListParams::default()).await.unwrap();
        assert_eq!(page.page.total, 1);
        assert_eq!(page.page.items[0].verb, VERB_FOLLOWED);
        assert_eq!(page.page.items[0].target, Some(Target::user(alice)));
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;

        match service.follow(alice, alice).await {
            Err(FollowServiceError::SelfFollow(msg)) => assert_eq!(msg, "You cannot follow yourself."),
            other => panic!("unexpected {:?}", other.map(|u| u.id)),
        }
        match service.unfollow(alice, alice).await {
            Err(FollowServiceError::SelfFollow(msg)) => assert_eq!(msg, "You cannot unfollow yourself."),
            other => panic!("unexpected {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        assert!(matches!(service.follow(alice, 999).await, Err(FollowServiceError::NotFound)));
        assert!(matches!(service.unfollow(alice, 999).await, Err(FollowServiceError::NotFound)));
        assert!(matches!(service.followers(999).await, Err(FollowServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_unfollow_is_idempotent() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        service.follow(bob, alice).await.unwrap();
        service.unfollow(bob, alice).await.unwrap();
        service.unfollow(bob, alice).await.unwrap();
        assert!(!service.is_following(bob, alice).await.unwrap());
        assert!(service.following(bob).await.unwrap().is_empty());
    }
}
