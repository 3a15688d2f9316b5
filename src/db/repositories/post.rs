//! Post repository
//!
//! Posts are read with their author's username and like/comment counters
//! computed in SQL. Tags are loaded in one extra query per page and
//! attached afterwards.

use crate::config::DatabaseDriver;
use crate::db::repositories::like_pattern;
use crate::db::DynDatabasePool;
use crate::models::{slugify, ListParams, Post, PostFilter, Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and link its tags in one transaction, creating
    /// missing tags by slug
    async fn create(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        content_html: &str,
        tags: &[String],
    ) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Overwrite title and content, and replace the tag set when `tags` is
    /// given, in one transaction; returns `None` if the post is gone
    async fn update(&self, post: &Post, tags: Option<&[String]>) -> Result<Option<Post>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered page of posts, newest first
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Posts by the users `user_id` follows, newest first
    async fn feed(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Every tag with the number of posts using it, by name
    async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        content_html: &str,
        tags: &[String],
    ) -> Result<i64> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self
                    .pool
                    .sqlite()?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                let id = sqlx::query(INSERT_POST)
                    .bind(author_id)
                    .bind(title)
                    .bind(content)
                    .bind(content_html)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create post")?
                    .last_insert_rowid();
                replace_tags_sqlite(&mut tx, id, tags).await?;
                tx.commit().await.context("Failed to commit post")?;
                Ok(id)
            }
            DatabaseDriver::Mysql => {
                let mut tx = self
                    .pool
                    .mysql()?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                let id = sqlx::query(INSERT_POST)
                    .bind(author_id)
                    .bind(title)
                    .bind(content)
                    .bind(content_html)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create post")?
                    .last_insert_id() as i64;
                replace_tags_mysql(&mut tx, id, tags).await?;
                tx.commit().await.context("Failed to commit post")?;
                Ok(id)
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} {} WHERE p.id = ?", POST_COLUMNS, POST_FROM);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get post")?;
                let mut posts: Vec<Post> = row.iter().map(row_to_post_sqlite).collect();
                attach_tags_sqlite(pool, &mut posts).await?;
                Ok(posts.pop())
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get post")?;
                let mut posts: Vec<Post> = row.iter().map(row_to_post_mysql).collect();
                attach_tags_mysql(pool, &mut posts).await?;
                Ok(posts.pop())
            }
        }
    }

    async fn update(&self, post: &Post, tags: Option<&[String]>) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self
                    .pool
                    .sqlite()?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                sqlx::query(UPDATE_POST)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(Utc::now())
                    .bind(post.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update post")?;
                if let Some(tags) = tags {
                    replace_tags_sqlite(&mut tx, post.id, tags).await?;
                }
                tx.commit().await.context("Failed to commit post")?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self
                    .pool
                    .mysql()?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                sqlx::query(UPDATE_POST)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(Utc::now())
                    .bind(post.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update post")?;
                if let Some(tags) = tags {
                    replace_tags_mysql(&mut tx, post.id, tags).await?;
                }
                tx.commit().await.context("Failed to commit post")?;
            }
        }
        self.get_by_id(post.id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_POST)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_POST)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let tag = filter
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let select = format!(
            "SELECT {} {} WHERE {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, POST_FROM, FILTER_WHERE
        );
        let count = format!("SELECT COUNT(*) as count FROM posts p WHERE {}", FILTER_WHERE);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = sqlx::query(&select)
                    .bind(&search)
                    .bind(&search)
                    .bind(&search)
                    .bind(filter.author_id)
                    .bind(filter.author_id)
                    .bind(&tag)
                    .bind(&tag)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list posts")?;
                let total: i64 = sqlx::query(&count)
                    .bind(&search)
                    .bind(&search)
                    .bind(&search)
                    .bind(filter.author_id)
                    .bind(filter.author_id)
                    .bind(&tag)
                    .bind(&tag)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let mut posts: Vec<Post> = rows.iter().map(row_to_post_sqlite).collect();
                attach_tags_sqlite(pool, &mut posts).await?;
                Ok((posts, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = sqlx::query(&select)
                    .bind(&search)
                    .bind(&search)
                    .bind(&search)
                    .bind(filter.author_id)
                    .bind(filter.author_id)
                    .bind(&tag)
                    .bind(&tag)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list posts")?;
                let total: i64 = sqlx::query(&count)
                    .bind(&search)
                    .bind(&search)
                    .bind(&search)
                    .bind(filter.author_id)
                    .bind(filter.author_id)
                    .bind(&tag)
                    .bind(&tag)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                let mut posts: Vec<Post> = rows.iter().map(row_to_post_mysql).collect();
                attach_tags_mysql(pool, &mut posts).await?;
                Ok((posts, total))
            }
        }
    }

    async fn feed(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let select = format!(
            "SELECT {} {} WHERE {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, POST_FROM, FEED_WHERE
        );
        let count = format!("SELECT COUNT(*) as count FROM posts p WHERE {}", FEED_WHERE);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = sqlx::query(&select)
                    .bind(user_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to load feed")?;
                let total: i64 = sqlx::query(&count)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count feed")?
                    .get("count");
                let mut posts: Vec<Post> = rows.iter().map(row_to_post_sqlite).collect();
                attach_tags_sqlite(pool, &mut posts).await?;
                Ok((posts, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = sqlx::query(&select)
                    .bind(user_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to load feed")?;
                let total: i64 = sqlx::query(&count)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count feed")?
                    .get("count");
                let mut posts: Vec<Post> = rows.iter().map(row_to_post_mysql).collect();
                attach_tags_mysql(pool, &mut posts).await?;
                Ok((posts, total))
            }
        }
    }


    async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(TAGS_WITH_COUNTS)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list tags")?;
                Ok(rows
                    .iter()
                    .map(|row| TagWithCount {
                        tag: Tag {
                            id: row.get("id"),
                            name: row.get("name"),
                            slug: row.get("slug"),
                        },
                        post_count: row.get("post_count"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(TAGS_WITH_COUNTS)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list tags")?;
                Ok(rows
                    .iter()
                    .map(|row| TagWithCount {
                        tag: Tag {
                            id: row.get("id"),
                            name: row.get("name"),
                            slug: row.get("slug"),
                        },
                        post_count: row.get("post_count"),
                    })
                    .collect())
            }
        }
    }
}

const POST_COLUMNS: &str = r#"
    p.id, p.author_id, u.username AS author_username, p.title, p.content, p.content_html,
    p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
"#;
const POST_FROM: &str = "FROM posts p JOIN users u ON u.id = p.author_id";

const FILTER_WHERE: &str = r#"
    (? IS NULL OR LOWER(p.title) LIKE ? ESCAPE '!' OR LOWER(p.content) LIKE ? ESCAPE '!')
    AND (? IS NULL OR p.author_id = ?)
    AND (? IS NULL OR EXISTS (
        SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = p.id AND t.slug = ?
    ))
"#;
const FEED_WHERE: &str =
    "p.author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)";

const INSERT_POST: &str = r#"
    INSERT INTO posts (author_id, title, content, content_html, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;
const UPDATE_POST: &str =
    "UPDATE posts SET title = ?, content = ?, content_html = ?, updated_at = ? WHERE id = ?";
const DELETE_POST: &str = "DELETE FROM posts WHERE id = ?";

const INSERT_TAG_SQLITE: &str =
    "INSERT OR IGNORE INTO tags (name, slug, created_at) VALUES (?, ?, ?)";
const INSERT_TAG_MYSQL: &str = "INSERT IGNORE INTO tags (name, slug, created_at) VALUES (?, ?, ?)";
const SELECT_TAG_BY_SLUG: &str = "SELECT id, name, slug FROM tags WHERE slug = ?";
const CLEAR_POST_TAGS: &str = "DELETE FROM post_tags WHERE post_id = ?";
const INSERT_POST_TAG_SQLITE: &str =
    "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)";
const INSERT_POST_TAG_MYSQL: &str = "INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)";
const TAGS_WITH_COUNTS: &str = r#"
    SELECT t.id, t.name, t.slug, COUNT(pt.post_id) AS post_count
    FROM tags t
    LEFT JOIN post_tags pt ON pt.tag_id = t.id
    GROUP BY t.id, t.name, t.slug
    ORDER BY t.name
"#;

/// `SELECT` of the tags for a set of posts; `n` is the number of post ids
fn tags_for_posts_sql(n: usize) -> String {
    format!(
        "SELECT pt.post_id, t.id, t.name, t.slug FROM post_tags pt \
         JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id IN ({}) ORDER BY t.name",
        vec!["?"; n].join(", ")
    )
}

fn assign_tags(posts: &mut [Post], mut by_post: HashMap<i64, Vec<Tag>>) {
    for post in posts.iter_mut() {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn attach_tags_sqlite(pool: &SqlitePool, posts: &mut [Post]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }
    let sql = tags_for_posts_sql(posts.len());
    let mut query = sqlx::query(&sql);
    for post in posts.iter() {
        query = query.bind(post.id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load post tags")?;

    let mut by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in &rows {
        by_post.entry(row.get("post_id")).or_default().push(Tag {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
        });
    }
    assign_tags(posts, by_post);
    Ok(())
}

/// Replace the tag set of `post_id` inside the caller's transaction
async fn replace_tags_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    names: &[String],
) -> Result<()> {
    sqlx::query(CLEAR_POST_TAGS)
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;

    for name in names {
        let slug = slugify(name);
        sqlx::query(INSERT_TAG_SQLITE)
            .bind(name)
            .bind(&slug)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to create tag")?;
        let tag_id: i64 = sqlx::query(SELECT_TAG_BY_SLUG)
            .bind(&slug)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to get tag")?
            .get("id");
        sqlx::query(INSERT_POST_TAG_SQLITE)
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to tag post")?;
    }
    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        tags: Vec::new(),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn attach_tags_mysql(pool: &MySqlPool, posts: &mut [Post]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }
    let sql = tags_for_posts_sql(posts.len());
    let mut query = sqlx::query(&sql);
    for post in posts.iter() {
        query = query.bind(post.id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load post tags")?;

    let mut by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in &rows {
        by_post.entry(row.get("post_id")).or_default().push(Tag {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
        });
    }
    assign_tags(posts, by_post);
    Ok(())
}

/// Replace the tag set of `post_id` inside the caller's transaction
async fn replace_tags_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    names: &[String],
) -> Result<()> {
    sqlx::query(CLEAR_POST_TAGS)
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;

    for name in names {
        let slug = slugify(name);
        sqlx::query(INSERT_TAG_MYSQL)
            .bind(name)
            .bind(&slug)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to create tag")?;
        let tag_id: i64 = sqlx::query(SELECT_TAG_BY_SLUG)
            .bind(&slug)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to get tag")?
            .get("id");
        sqlx::query(INSERT_POST_TAG_MYSQL)
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to tag post")?;
    }
    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        tags: Vec::new(),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
