//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CreateCommentInput, ListParams, PagedResult, Target};
use crate::services::notification::{NotificationService, VERB_COMMENTED_POST};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found")]
    NotFound,

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    notifications: Arc<NotificationService>,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            notifications,
        }
    }

    /// Comments oldest first, optionally only those on one post
    pub async fn list(
        &self,
        post_id: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (comments, total) = self
            .comment_repo
            .list(post_id, params)
            .await
            .context("Failed to list comments")?;
        Ok(PagedResult::new(comments, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.comment_repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or(CommentServiceError::NotFound)
    }

    /// Comment on a post and notify its author
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let content = validate_content(&input.content)?;
        let post = self
            .post_repo
            .get_by_id(input.post_id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| CommentServiceError::ValidationError {
                field: "post".to_string(),
                message: format!("Invalid pk \"{}\" - object does not exist.", input.post_id),
            })?;

        let comment = self
            .comment_repo
            .create(post.id, author_id, &content)
            .await
            .context("Failed to create comment")?;
        self.notifications
            .notify_quietly(author_id, post.author_id, VERB_COMMENTED_POST, Some(Target::post(post.id)))
            .await;
        Ok(comment)
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        content: &str,
    ) -> Result<Comment, CommentServiceError> {
        self.owned(user_id, id).await?;
        let content = validate_content(content)?;
        self.comment_repo
            .update_content(id, &content)
            .await
            .context("Failed to update comment")?
            .ok_or(CommentServiceError::NotFound)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), CommentServiceError> {
        self.owned(user_id, id).await?;
        self.comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.get(id).await?;
        if comment.author_id != user_id {
            return Err(CommentServiceError::PermissionDenied);
        }
        Ok(comment)
    }
}

fn validate_content(content: &str) -> Result<String, CommentServiceError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommentServiceError::ValidationError {
            field: "content".to_string(),
            message: "This field is required.".to_string(),
        });
    }
    Ok(content.to_string())
}
