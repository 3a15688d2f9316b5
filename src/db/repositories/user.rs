//! User repository
//!
//! Username and email lookups ignore case, matching the uniqueness rules
//! enforced at registration.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    /// Insert a self-registered account. The role is decided in the same
    /// statement: admin when the table is empty, otherwise member.
    async fn register(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Users ordered by id
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn register(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => register_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => register_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, SELECT_BY_USERNAME, username).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, SELECT_BY_USERNAME, username).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, SELECT_BY_EMAIL, email).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, SELECT_BY_EMAIL, email).await
            }
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(DELETE_USER)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(DELETE_USER)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_users_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => count_users_mysql(self.pool.mysql()?).await,
        }
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(self.pool.sqlite()?, params).await,
            DatabaseDriver::Mysql => list_users_mysql(self.pool.mysql()?, params).await,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, profile_picture, role, is_active, created_at, updated_at";

const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, password_hash, bio, profile_picture, role, is_active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const REGISTER_USER: &str = r#"
    INSERT INTO users
        (username, email, password_hash, bio, profile_picture, role, is_active,
         created_at, updated_at)
    SELECT ?, ?, ?, ?, ?,
        CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'member' ELSE 'admin' END,
        ?, ?, ?
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET username = ?, email = ?, password_hash = ?, bio = ?, profile_picture = ?, role = ?, is_active = ?, updated_at = ?
    WHERE id = ?
"#;

const DELETE_USER: &str = "DELETE FROM users WHERE id = ?";

const SELECT_BY_USERNAME: &str = "LOWER(username) = LOWER(?)";
const SELECT_BY_EMAIL: &str = "LOWER(email) = LOWER(?)";

fn select_where(condition: &str) -> String {
    format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition)
}

fn created(user: &User, id: i64, now: chrono::DateTime<Utc>) -> User {
    User {
        id,
        created_at: now,
        updated_at: now,
        ..user.clone()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.role.to_string())
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(created(user, result.last_insert_rowid(), now))
}

async fn register_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(REGISTER_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to register user")?;

    get_user_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Registered user not found")
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&select_where("id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_where_sqlite(
    pool: &SqlitePool,
    condition: &str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&select_where(condition))
        .bind(value.trim())
        .fetch_optional(pool)
        .await
        .context("Failed to look up user")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.role.to_string())
        .bind(user.is_active)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<(Vec<User>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows
        .iter()
        .map(row_to_user_sqlite)
        .collect::<Result<Vec<_>>>()?;
    let total = count_users_sqlite(pool).await?;
    Ok((users, total))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        profile_picture: row.get("profile_picture"),
        role,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.role.to_string())
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(created(user, result.last_insert_id() as i64, now))
}

async fn register_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(REGISTER_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to register user")?;

    get_user_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Registered user not found")
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&select_where("id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_where_mysql(
    pool: &MySqlPool,
    condition: &str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&select_where(condition))
        .bind(value.trim())
        .fetch_optional(pool)
        .await
        .context("Failed to look up user")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.profile_picture)
        .bind(user.role.to_string())
        .bind(user.is_active)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_mysql(pool: &MySqlPool, params: &ListParams) -> Result<(Vec<User>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows
        .iter()
        .map(row_to_user_mysql)
        .collect::<Result<Vec<_>>>()?;
    let total = count_users_mysql(pool).await?;
    Ok((users, total))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        profile_picture: row.get("profile_picture"),
        role,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(setup_pool().await)
    }

    fn new_user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            email.to_string(),
            "hash".to_string(),
            UserRole::Member,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;
        let created = repo.create(&new_user("alice", "alice@example.com")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, UserRole::Member);
        assert!(found.is_active);
        assert!(found.profile_picture.is_none());
    }

    #[tokio::test]
    async fn test_register_makes_only_first_account_admin() {
        let repo = setup_test_repo().await;
        let first = new_user("root", "root@example.com");
        let second = new_user("bob", "bob@example.com");
        let (first, second) = tokio::join!(repo.register(&first), repo.register(&second));
        let roles = [first.unwrap().role, second.unwrap().role];
        assert_eq!(roles.iter().filter(|r| **r == UserRole::Admin).count(), 1);

        let mut third = new_user("carol", "carol@example.com");
        third.role = UserRole::Admin;
        let third = repo.register(&third).await.unwrap();
        assert_eq!(third.role, UserRole::Member);
        assert_eq!(repo.get_by_id(third.id).await.unwrap().unwrap().role, UserRole::Member);
    }

    #[tokio::test]
    async fn test_lookups_ignore_case() {
        let repo = setup_test_repo().await;
        repo.create(&new_user("Alice", "Alice@Example.com")).await.unwrap();

        assert!(repo.get_by_username("ALICE").await.unwrap().is_some());
        assert!(repo.get_by_email("alice@example.COM").await.unwrap().is_some());
        assert!(repo.get_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_profile_fields() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&new_user("carol", "carol@example.com")).await.unwrap();

        user.bio = "Reads a lot".to_string();
        user.profile_picture = Some("/uploads/avatars/c.png".to_string());
        user.role = UserRole::Librarian;
        user.is_active = false;
        let updated = repo.update(&user).await.unwrap();

        assert_eq!(updated.bio, "Reads a lot");
        assert_eq!(updated.profile_picture.as_deref(), Some("/uploads/avatars/c.png"));
        assert_eq!(updated.role, UserRole::Librarian);
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let repo = setup_test_repo().await;
        for i in 0..3 {
            repo.create(&new_user(&format!("u{}", i), &format!("u{}@example.com", i)))
                .await
                .unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 3);
        let (page, total) = repo.list(&ListParams::new(2, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "u2");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = setup_test_repo().await;
        let user = repo.create(&new_user("dave", "dave@example.com")).await.unwrap();
        repo.delete(user.id).await.unwrap();
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }
}
