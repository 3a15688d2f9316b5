//! Library and librarian models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Book;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The single staff member assigned to a library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Librarian {
    pub id: i64,
    pub name: String,
    pub library_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A library with its holdings and librarian
#[derive(Debug, Clone, Serialize)]
pub struct LibraryDetail {
    #[serde(flatten)]
    pub library: Library,
    pub books: Vec<Book>,
    pub librarian: Option<Librarian>,
}
