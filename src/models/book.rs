//! Book model and list filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A catalogued book, joined with its author's name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    /// Filled from the `authors` join; ignored on write
    #[serde(rename = "author", default)]
    pub author_name: String,
    pub publication_year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBookInput {
    pub title: String,
    pub author_id: i64,
    pub publication_year: i32,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub author_id: Option<i64>,
    pub publication_year: Option<i32>,
}

impl UpdateBookInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author_id.is_none() && self.publication_year.is_none()
    }
}

/// Sort order accepted by the book list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookOrdering {
    #[default]
    Id,
    Title,
    TitleDesc,
    Year,
    YearDesc,
}

impl BookOrdering {
    /// SQL `ORDER BY` body; the `b` alias refers to `books`
    pub fn sql(&self) -> &'static str {
        match self {
            BookOrdering::Id => "b.id ASC",
            BookOrdering::Title => "b.title ASC, b.id ASC",
            BookOrdering::TitleDesc => "b.title DESC, b.id ASC",
            BookOrdering::Year => "b.publication_year ASC, b.id ASC",
            BookOrdering::YearDesc => "b.publication_year DESC, b.id ASC",
        }
    }
}

impl fmt::Display for BookOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookOrdering::Id => write!(f, "id"),
            BookOrdering::Title => write!(f, "title"),
            BookOrdering::TitleDesc => write!(f, "-title"),
            BookOrdering::Year => write!(f, "publication_year"),
            BookOrdering::YearDesc => write!(f, "-publication_year"),
        }
    }
}

impl FromStr for BookOrdering {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "id" => Ok(BookOrdering::Id),
            "title" => Ok(BookOrdering::Title),
            "-title" => Ok(BookOrdering::TitleDesc),
            "publication_year" => Ok(BookOrdering::Year),
            "-publication_year" => Ok(BookOrdering::YearDesc),
            other => Err(anyhow::anyhow!("Invalid ordering: {}", other)),
        }
    }
}

/// Book list filters; every `None` field is ignored
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Case-insensitive match on title or author name
    pub search: Option<String>,
    /// Exact title
    pub title: Option<String>,
    pub author_id: Option<i64>,
    /// Case-insensitive substring of the author's name
    pub author_name: Option<String>,
    pub publication_year: Option<i32>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub ordering: BookOrdering,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_parse() {
        assert_eq!("title".parse::<BookOrdering>().unwrap(), BookOrdering::Title);
        assert_eq!(
            "-publication_year".parse::<BookOrdering>().unwrap(),
            BookOrdering::YearDesc
        );
        assert_eq!("".parse::<BookOrdering>().unwrap(), BookOrdering::Id);
        assert!("author; DROP TABLE books".parse::<BookOrdering>().is_err());
    }

    #[test]
    fn test_ordering_display_round_trip() {
        for ordering in [
            BookOrdering::Id,
            BookOrdering::Title,
            BookOrdering::TitleDesc,
            BookOrdering::Year,
            BookOrdering::YearDesc,
        ] {
            assert_eq!(ordering.to_string().parse::<BookOrdering>().unwrap(), ordering);
        }
    }

    #[test]
    fn test_update_input_is_empty() {
        assert!(UpdateBookInput::default().is_empty());
        let input = UpdateBookInput {
            publication_year: Some(1999),
            ..Default::default()
        };
        assert!(!input.is_empty());
    }
}
