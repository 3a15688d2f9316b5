//! Likes, follows and notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// `follower_id` follows `followed_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: i64,
    pub followed_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Kind of object a notification points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
    User,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Post => write!(f, "post"),
            TargetType::Comment => write!(f, "comment"),
            TargetType::User => write!(f, "user"),
        }
    }
}

impl FromStr for TargetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetType::Post),
            "comment" => Ok(TargetType::Comment),
            "user" => Ok(TargetType::User),
            _ => Err(anyhow::anyhow!("Invalid notification target: {}", s)),
        }
    }
}

/// Generic pointer to the object an action was performed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetType,
    pub id: i64,
}

impl Target {
    pub fn post(id: i64) -> Self {
        Self {
            kind: TargetType::Post,
            id,
        }
    }

    pub fn user(id: i64) -> Self {
        Self {
            kind: TargetType::User,
            id,
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            kind: TargetType::Comment,
            id,
        }
    }
}

/// "`actor` `verb` `target`", delivered to `recipient`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub actor_id: i64,
    pub actor_username: String,
    pub verb: String,
    pub target: Option<Target>,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub actor_id: i64,
    pub verb: String,
    pub target: Option<Target>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_serializes_with_type_key() {
        let json = serde_json::to_value(Target::post(4)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "post", "id": 4}));
    }

    #[test]
    fn test_target_type_parse() {
        assert_eq!("comment".parse::<TargetType>().unwrap(), TargetType::Comment);
        assert!("article".parse::<TargetType>().is_err());
    }
}
