//! Author model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Author {
    pub fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Body for creating or renaming an author
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorInput {
    #[serde(default)]
    pub name: String,
}
