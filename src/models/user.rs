//! User model
//!
//! Accounts carry a profile (bio, picture), a role that gates catalog
//! management, and an active flag checked at login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique, compared case-insensitively
    pub username: String,
    /// Unique, compared case-insensitively
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: String,
    /// Stored path or URL of the uploaded picture
    pub profile_picture: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user. The password must already be hashed.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            bio: String::new(),
            profile_picture: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Librarians and admins may change libraries and their holdings
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Librarian)
    }

    /// Uploaded picture, or a Gravatar derived from the email
    pub fn avatar_url(&self) -> String {
        match &self.profile_picture {
            Some(picture) if !picture.is_empty() => picture.clone(),
            _ => gravatar_url(&self.email),
        }
    }
}

pub fn gravatar_url(email: &str) -> String {
    let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
    format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
}

/// Role used for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access, including user administration
    Admin,
    /// Manages libraries and their books
    Librarian,
    /// Browses the catalog and uses the social features
    #[default]
    Member,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Librarian => write!(f, "librarian"),
            UserRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "librarian" => Ok(UserRole::Librarian),
            "member" => Ok(UserRole::Member),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Id and name of a user, as shown in follower lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

/// Profile changes; `None` leaves a field as it is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    /// An empty string clears the picture
    pub profile_picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User::new(
            "reader".to_string(),
            "Reader@Example.com ".to_string(),
            "hash".to_string(),
            role,
        )
    }

    #[test]
    fn test_user_new() {
        let user = user(UserRole::Member);
        assert_eq!(user.id, 0);
        assert!(user.is_active);
        assert!(user.bio.is_empty());
        assert!(user.profile_picture.is_none());
    }

    #[test]
    fn test_catalog_permissions() {
        assert!(user(UserRole::Admin).can_manage_catalog());
        assert!(user(UserRole::Librarian).can_manage_catalog());
        assert!(!user(UserRole::Member).can_manage_catalog());
        assert!(user(UserRole::Admin).is_admin());
        assert!(!user(UserRole::Librarian).is_admin());
    }

    #[test]
    fn test_avatar_falls_back_to_gravatar() {
        let mut user = user(UserRole::Member);
        let expected = format!("{:x}", md5::compute("reader@example.com"));
        assert!(user.avatar_url().contains(&expected));

        user.profile_picture = Some("/uploads/avatars/a.png".to_string());
        assert_eq!(user.avatar_url(), "/uploads/avatars/a.png");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserRole::Member)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "member");
    }

    #[test]
    fn test_user_role_round_trip() {
        for role in [UserRole::Admin, UserRole::Librarian, UserRole::Member] {
            assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
        assert_eq!(UserRole::from_str("LIBRARIAN").unwrap(), UserRole::Librarian);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Member);
    }
}
