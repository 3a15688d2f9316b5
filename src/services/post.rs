//! Post service
//!
//! Posts are written in Markdown and rendered once on write. Only the
//! author may change or delete a post. Likes live here too since they are
//! checked against the post and notify its author.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{LikeRepository, PostRepository};
use crate::models::{
    normalize_tag_names, CreatePostInput, ListParams, PagedResult, Post, PostFilter, Target,
    TagWithCount, UpdatePostInput,
};
use crate::services::markdown::MarkdownRenderer;
use crate::services::notification::{NotificationService, VERB_LIKED_POST};
use anyhow::Context;
use std::sync::Arc;

pub const TITLE_MAX_LEN: usize = 200;
/// Matches the width of `tags.name`
pub const TAG_NAME_MAX_LEN: usize = 50;

pub const MSG_ALREADY_LIKED: &str = "You already liked this post.";
pub const MSG_NOT_LIKED: &str = "You have not liked this post.";

const CACHE_KEY_TAGS: &str = "tags:all";

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    /// The action conflicts with the current state (e.g. a repeated like)
    #[error("{0}")]
    InvalidAction(String),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl PostServiceError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    like_repo: Arc<dyn LikeRepository>,
    notifications: Arc<NotificationService>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        like_repo: Arc<dyn LikeRepository>,
        notifications: Arc<NotificationService>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            post_repo,
            like_repo,
            notifications,
            cache,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn list(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self
            .post_repo
            .list(filter, params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(posts, total, params))
    }

    /// Posts by the users `user_id` follows
    pub async fn feed(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self
            .post_repo
            .feed(user_id, params)
            .await
            .context("Failed to load feed")?;
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn create(
        &self,
        author_id: i64,
        input: CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        let title = validate_title(&input.title)?;
        let content = validate_content(&input.content)?;
        let tags = validate_tags(&input.tags)?;
        let content_html = self.renderer.render(&content);

        let id = self
            .post_repo
            .create(author_id, &title, &content, &content_html, &tags)
            .await
            .context("Failed to create post")?;
        self.invalidate_tags().await;

        tracing::info!(post_id = id, author_id, "Created post {}", title);
        self.get(id).await
    }

    /// Edit a post. With `partial == false` (PUT) title and content are
    /// required; tags are replaced only when given.
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        input: UpdatePostInput,
        partial: bool,
    ) -> Result<Post, PostServiceError> {
        let mut post = self.owned(user_id, id).await?;

        if !partial {
            if input.title.is_none() {
                return Err(PostServiceError::invalid("title", "This field is required."));
            }
            if input.content.is_none() {
                return Err(PostServiceError::invalid("content", "This field is required."));
            }
        }
        if let Some(title) = input.title {
            post.title = validate_title(&title)?;
        }
        if let Some(content) = input.content {
            post.content = validate_content(&content)?;
            post.content_html = self.renderer.render(&post.content);
        }
        let tags = input.tags.as_deref().map(validate_tags).transpose()?;

        let updated = self
            .post_repo
            .update(&post, tags.as_deref())
            .await
            .context("Failed to update post")?
            .ok_or(PostServiceError::NotFound)?;
        if tags.is_some() {
            self.invalidate_tags().await;
        }
        Ok(updated)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), PostServiceError> {
        self.owned(user_id, id).await?;
        self.post_repo
            .delete(id)
            .await
            .context("Failed to delete post")?;
        self.invalidate_tags().await;
        Ok(())
    }

    /// Like a post once; notifies its author unless they liked it themselves
    pub async fn like(&self, user_id: i64, post_id: i64) -> Result<(), PostServiceError> {
        let post = self.get(post_id).await?;
        let created = self
            .like_repo
            .like(post.id, user_id)
            .await
            .context("Failed to like post")?;
        if !created {
            return Err(PostServiceError::InvalidAction(MSG_ALREADY_LIKED.to_string()));
        }
        self.notifications
            .notify_quietly(user_id, post.author_id, VERB_LIKED_POST, Some(Target::post(post.id)))
            .await;
        Ok(())
    }

    pub async fn unlike(&self, user_id: i64, post_id: i64) -> Result<(), PostServiceError> {
        let post = self.get(post_id).await?;
        let removed = self
            .like_repo
            .unlike(post.id, user_id)
            .await
            .context("Failed to unlike post")?;
        if removed {
            Ok(())
        } else {
            Err(PostServiceError::InvalidAction(MSG_NOT_LIKED.to_string()))
        }
    }

    pub async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool, PostServiceError> {
        Ok(self
            .like_repo
            .has_liked(post_id, user_id)
            .await
            .context("Failed to check like")?)
    }

    /// Every tag with its post count, cached until a post's tags change
    pub async fn tags(&self) -> Result<Vec<TagWithCount>, PostServiceError> {
        if let Ok(Some(tags)) = self.cache.get::<Vec<TagWithCount>>(CACHE_KEY_TAGS).await {
            return Ok(tags);
        }
        let tags = self
            .post_repo
            .tags_with_counts()
            .await
            .context("Failed to list tags")?;
        let _ = self
            .cache
            .set(CACHE_KEY_TAGS, &tags, self.cache.default_ttl())
            .await;
        Ok(tags)
    }

    /// Render Markdown the way stored posts are rendered
    pub fn render(&self, source: &str) -> String {
        self.renderer.render(source)
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get(id).await?;
        if post.author_id != user_id {
            return Err(PostServiceError::PermissionDenied);
        }
        Ok(post)
    }

    async fn invalidate_tags(&self) {
        let _ = self.cache.delete(CACHE_KEY_TAGS).await;
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::invalid("title", "This field is required."));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(PostServiceError::invalid(
            "title",
            format!("Ensure this field has no more than {} characters.", TITLE_MAX_LEN),
        ));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, PostServiceError> {
    if content.trim().is_empty() {
        return Err(PostServiceError::invalid("content", "This field is required."));
    }
    Ok(content.to_string())
}

fn validate_tags(tags: &[String]) -> Result<Vec<String>, PostServiceError> {
    let tags = normalize_tag_names(tags);
    if let Some(long) = tags.iter().find(|t| t.chars().count() > TAG_NAME_MAX_LEN) {
        return Err(PostServiceError::invalid(
            "tags",
            format!(
                "Tag \"{}\" is too long. Ensure tags have no more than {} characters.",
                long, TAG_NAME_MAX_LEN
            ),
        ));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        FollowRepository, SqlxFollowRepository, SqlxLikeRepository, SqlxNotificationRepository,
        SqlxPostRepository,
    };
    use crate::db::DynDatabasePool;

    async fn setup_test_service() -> (DynDatabasePool, PostService, Arc<NotificationService>) {
        let pool = setup_pool().await;
        let notifications = Arc::new(NotificationService::new(SqlxNotificationRepository::boxed(
            pool.clone(),
        )));
        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxLikeRepository::boxed(pool.clone()),
            notifications.clone(),
            Arc::new(Cache::Memory(MemoryCache::new())),
        );
        (pool, service, notifications)
    }

    fn new_post(title: &str, content: &str, tags: &[&str]) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    // ========================================================================
    // Create and read
    // ========================================================================

    #[tokio::test]
    async fn test_create_renders_markdown_and_tags() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;

        let post = service
            .create(
                alice,
                new_post("Hello", "Some **bold** <b>html</b>", &["Rust", "rust ", "Web Dev"]),
            )
            .await
            .unwrap();
        assert_eq!(post.author_username, "alice");
        assert!(post.content_html.contains("<strong>bold</strong>"));
        assert!(post.content_html.contains("&lt;b&gt;"));
        let slugs: Vec<_> = post.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs.len(), 2);
        assert!(slugs.contains(&"rust"));
        assert!(slugs.contains(&"web-dev"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        assert!(matches!(
            service.create(alice, new_post(" ", "body", &[])).await,
            Err(PostServiceError::ValidationError { ref field, .. }) if field == "title"
        ));
        assert!(matches!(
            service.create(alice, new_post("Title", "  ", &[])).await,
            Err(PostServiceError::ValidationError { ref field, .. }) if field == "content"
        ));
        assert!(service.create(alice, new_post(&"t".repeat(201), "body", &[])).await.is_err());
    }

    #[tokio::test]
    async fn test_overlong_tag_rejected_without_writing() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let long_tag = "x".repeat(TAG_NAME_MAX_LEN + 1);
        let widest_tag = "y".repeat(TAG_NAME_MAX_LEN);

        assert!(matches!(
            service.create(alice, new_post("Title", "body", &[long_tag.as_str()])).await,
            Err(PostServiceError::ValidationError { ref field, .. }) if field == "tags"
        ));
        let page = service
            .list(&PostFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let post = service
            .create(alice, new_post("Title", "body", &[widest_tag.as_str()]))
            .await
            .unwrap();
        let edit = UpdatePostInput {
            title: Some("Changed".to_string()),
            tags: Some(vec![long_tag]),
            ..Default::default()
        };
        assert!(matches!(
            service.update(alice, post.id, edit, true).await,
            Err(PostServiceError::ValidationError { ref field, .. }) if field == "tags"
        ));
        assert_eq!(service.get(post.id).await.unwrap().title, "Title");
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    #[tokio::test]
    async fn test_only_author_can_edit_or_delete() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let post = service.create(alice, new_post("Mine", "body", &[])).await.unwrap();

        let edit = UpdatePostInput {
            title: Some("Stolen".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(bob, post.id, edit.clone(), true).await,
            Err(PostServiceError::PermissionDenied)
        ));
        assert!(matches!(
            service.delete(bob, post.id).await,
            Err(PostServiceError::PermissionDenied)
        ));

        let updated = service.update(alice, post.id, edit, true).await.unwrap();
        assert_eq!(updated.title, "Stolen");
        assert_eq!(updated.content, "body");

        service.delete(alice, post.id).await.unwrap();
        assert!(matches!(service.get(post.id).await, Err(PostServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_put_requires_title_and_content() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let post = service.create(alice, new_post("Mine", "body", &["a"])).await.unwrap();

        let input = UpdatePostInput {
            title: Some("New".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(alice, post.id, input, false).await,
            Err(PostServiceError::ValidationError { ref field, .. }) if field == "content"
        ));

        let input = UpdatePostInput {
            title: Some("New".to_string()),
            content: Some("# Heading".to_string()),
            tags: Some(vec!["b".to_string()]),
        };
        let updated = service.update(alice, post.id, input, false).await.unwrap();
        assert!(updated.content_html.contains("<h1>Heading</h1>"));
        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.tags[0].slug, "b");
    }

    // ========================================================================
    // Likes
    // ========================================================================

    #[tokio::test]
    async fn test_like_once_and_notify_author() {
        let (pool, service, notifications) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let post = service.create(alice, new_post("Hi", "body", &[])).await.unwrap();

        service.like(bob, post.id).await.unwrap();
        match service.like(bob, post.id).await {
            Err(PostServiceError::InvalidAction(msg)) => assert_eq!(msg, MSG_ALREADY_LIKED),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(service.get(post.id).await.unwrap().like_count, 1);
        assert!(service.has_liked(bob, post.id).await.unwrap());

        let page = notifications.list(alice, &ListParams::default()).await.unwrap();
        assert_eq!(page.page.total, 1);
        assert_eq!(page.page.items[0].verb, VERB_LIKED_POST);
        assert_eq!(page.page.items[0].target, Some(Target::post(post.id)));
    }

    #[tokio::test]
    async fn test_self_like_does_not_notify() {
        let (pool, service, notifications) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let post = service.create(alice, new_post("Hi", "body", &[])).await.unwrap();

        service.like(alice, post.id).await.unwrap();
        assert_eq!(notifications.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unlike() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let post = service.create(alice, new_post("Hi", "body", &[])).await.unwrap();

        match service.unlike(bob, post.id).await {
            Err(PostServiceError::InvalidAction(msg)) => assert_eq!(msg, MSG_NOT_LIKED),
            other => panic!("unexpected {:?}", other),
        }
        service.like(bob, post.id).await.unwrap();
        service.unlike(bob, post.id).await.unwrap();
        assert_eq!(service.get(post.id).await.unwrap().like_count, 0);
        assert!(matches!(service.like(bob, 999).await, Err(PostServiceError::NotFound)));
    }

    // ========================================================================
    // Feed and tags
    // ========================================================================

    #[tokio::test]
    async fn test_feed_contains_only_followed_authors() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        service.create(bob, new_post("From bob", "body", &[])).await.unwrap();
        service.create(carol, new_post("From carol", "body", &[])).await.unwrap();
        SqlxFollowRepository::new(pool.clone()).follow(alice, bob).await.unwrap();

        let feed = service.feed(alice, &ListParams::default()).await.unwrap();
        assert_eq!(feed.total, 1);
        assert_eq!(feed.items[0].title, "From bob");
    }

    #[tokio::test]
    async fn test_tag_counts_refresh_after_post_changes() {
        let (pool, service, _) = setup_test_service().await;
        let alice = insert_user(&pool, "alice").await;
        service.create(alice, new_post("One", "body", &["rust"])).await.unwrap();
        assert_eq!(service.tags().await.unwrap()[0].post_count, 1);

        let second = service.create(alice, new_post("Two", "body", &["rust"])).await.unwrap();
        assert_eq!(service.tags().await.unwrap()[0].post_count, 2);

        service.delete(alice, second.id).await.unwrap();
        assert_eq!(service.tags().await.unwrap()[0].post_count, 1);
    }
}
