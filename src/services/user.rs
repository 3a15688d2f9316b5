//! User service
//!
//! Account lifecycle and authentication:
//! - registration (the first account becomes admin)
//! - login with a reusable per-user token, logout
//! - token validation for the auth middleware
//! - profile read/update and admin management of roles and activation

use crate::db::repositories::{FollowRepository, SessionRepository, UserRepository};
use crate::models::{ListParams, PagedResult, Session, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

pub const USERNAME_MAX_LEN: usize = 15;
pub const PASSWORD_MIN_LEN: usize = 6;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_USERNAME_TAKEN: &str = "A user with this username already exists.";
pub const MSG_EMAIL_TAKEN: &str = "A user with this email already exists.";
pub const MSG_CREDENTIALS_REQUIRED: &str = "Email and password are required.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const MSG_INACTIVE: &str = "This account is inactive.";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Credentials rejected at login
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Profile as shown to its owner and to other users
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Uploaded picture or Gravatar fallback
    pub profile_picture: String,
    pub bio: String,
    pub role: UserRole,
    /// Ids of the users following this one
    pub followers: Vec<i64>,
    pub followers_count: i64,
    pub following_count: i64,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    follow_repo: Arc<dyn FollowRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        follow_repo: Arc<dyn FollowRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            follow_repo,
            session_days,
        }
    }

    /// Register a new account
    ///
    /// The first account in an empty database becomes admin; everyone else
    /// starts as a member.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&input.password)?;

        self.ensure_username_free(&username, None).await?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = self
            .user_repo
            .register(&User::new(username, email, password_hash, UserRole::Member))
            .await
            .context("Failed to create user")?;
        tracing::info!(user_id = user.id, role = %user.role, "Registered user {}", user.username);
        Ok(user)
    }

    /// Check credentials and return the user's live token
    ///
    /// An unexpired token is reused, so repeated logins hand out the same
    /// token until it expires or the user logs out.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = input.email.trim();
        if email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::AuthenticationError(
                MSG_CREDENTIALS_REQUIRED.to_string(),
            ));
        }

        let user = match self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) => user,
            None => {
                return Err(UserServiceError::AuthenticationError(
                    MSG_INVALID_CREDENTIALS.to_string(),
                ))
            }
        };

        if !verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?
        {
            return Err(UserServiceError::AuthenticationError(
                MSG_INVALID_CREDENTIALS.to_string(),
            ));
        }
        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(MSG_INACTIVE.to_string()));
        }

        let session = self.token_for(user.id).await?;
        Ok((session, user))
    }

    /// Check a password for an already identified user (HTML login by username)
    pub async fn login_by_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Session, User), UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        match user {
            Some(user) => self.login(LoginInput::new(user.email, password)).await,
            None => Err(UserServiceError::AuthenticationError(
                MSG_INVALID_CREDENTIALS.to_string(),
            )),
        }
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a token to its user
    ///
    /// Unknown or expired tokens and inactive users all yield `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// The user or `NotFound`
    pub async fn require(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    pub async fn profile(&self, user_id: i64) -> Result<Profile, UserServiceError> {
        let user = self.require(user_id).await?;
        self.profile_of(user).await
    }

    /// Build the profile view of a loaded user
    pub async fn profile_of(&self, user: User) -> Result<Profile, UserServiceError> {
        let followers = self
            .follow_repo
            .followers(user.id)
            .await
            .context("Failed to list followers")?;
        let (followers_count, following_count) = self
            .follow_repo
            .counts(user.id)
            .await
            .context("Failed to count follows")?;

        Ok(Profile {
            id: user.id,
            profile_picture: user.avatar_url(),
            username: user.username,
            email: user.email,
            bio: user.bio,
            role: user.role,
            followers: followers.into_iter().map(|f| f.id).collect(),
            followers_count,
            following_count,
        })
    }

    /// Apply a profile update
    ///
    /// With `partial == false` (PUT) username and email are required. An
    /// empty bio or picture clears the field.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
        partial: bool,
    ) -> Result<User, UserServiceError> {
        let mut user = self.require(user_id).await?;

        if !partial {
            if input.username.is_none() {
                return Err(UserServiceError::invalid("username", MSG_REQUIRED));
            }
            if input.email.is_none() {
                return Err(UserServiceError::invalid("email", MSG_REQUIRED));
            }
        }

        if let Some(username) = input.username {
            let username = username.trim().to_string();
            validate_username(&username)?;
            self.ensure_username_free(&username, Some(user.id)).await?;
            user.username = username;
        }
        if let Some(email) = input.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            self.ensure_email_free(&email, Some(user.id)).await?;
            user.email = email;
        }
        if let Some(bio) = input.bio {
            user.bio = bio.trim().to_string();
        }
        if let Some(picture) = input.profile_picture {
            let picture = picture.trim();
            user.profile_picture = (!picture.is_empty()).then(|| picture.to_string());
        }

        self.save(user).await
    }

    pub async fn set_profile_picture(
        &self,
        user_id: i64,
        url: &str,
    ) -> Result<User, UserServiceError> {
        let mut user = self.require(user_id).await?;
        user.profile_picture = Some(url.to_string());
        self.save(user).await
    }

    pub async fn list_users(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list(params)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn set_role(&self, user_id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let mut user = self.require(user_id).await?;
        user.role = role;
        self.save(user).await
    }

    /// Activate or deactivate an account; deactivation revokes its tokens
    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<User, UserServiceError> {
        let mut user = self.require(user_id).await?;
        user.is_active = active;
        let user = self.save(user).await?;
        if !active {
            self.session_repo
                .delete_by_user(user.id)
                .await
                .context("Failed to revoke sessions")?;
        }
        Ok(user)
    }

    /// Delete expired tokens; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    async fn token_for(&self, user_id: i64) -> Result<Session, UserServiceError> {
        if let Some(session) = self
            .session_repo
            .get_active_for_user(user_id)
            .await
            .context("Failed to look up session")?
        {
            return Ok(session);
        }
        let session = self
            .session_repo
            .create(&Session::issue(user_id, self.session_days))
            .await
            .context("Failed to create session")?;
        Ok(session)
    }

    async fn save(&self, mut user: User) -> Result<User, UserServiceError> {
        user.updated_at = Utc::now();
        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?)
    }

    async fn ensure_username_free(
        &self,
        username: &str,
        except: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        match existing {
            Some(other) if Some(other.id) != except => {
                Err(UserServiceError::invalid("username", MSG_USERNAME_TAKEN))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_email_free(
        &self,
        email: &str,
        except: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(other) if Some(other.id) != except => {
                Err(UserServiceError::invalid("email", MSG_EMAIL_TAKEN))
            }
            _ => Ok(()),
        }
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::invalid("username", MSG_REQUIRED));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(UserServiceError::invalid(
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX_LEN),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::invalid(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Err(UserServiceError::invalid("email", MSG_REQUIRED));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(UserServiceError::invalid("email", "Enter a valid email address."));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.is_empty() {
        return Err(UserServiceError::invalid("password", MSG_REQUIRED));
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(UserServiceError::invalid(
            "password",
            format!("Ensure this field has at least {} characters.", PASSWORD_MIN_LEN),
        ));
    }
    Ok(())
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn valid_usernames_accepted(name in "[A-Za-z0-9@.+_-]{1,15}") {
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn long_usernames_rejected(name in "[a-z]{16,40}") {
            prop_assert!(validate_username(&name).is_err());
        }

        #[test]
        fn usernames_with_spaces_rejected(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
            let name = format!("{} {}", a, b);
            prop_assert!(validate_username(&name).is_err());
        }

        #[test]
        fn short_passwords_rejected(password in ".{1,5}") {
            prop_assert!(validate_password(&password).is_err());
        }
    }
}
