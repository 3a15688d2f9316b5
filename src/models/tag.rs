//! Tag model

use serde::{Deserialize, Serialize};

/// Free-form label attached to posts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Tag with the number of posts carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}

/// URL-friendly form of a tag name
///
/// Lowercases, turns runs of separators and ASCII punctuation into a single
/// hyphen and keeps non-ASCII letters as they are.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Trim, drop empties and deduplicate tag names case-insensitively,
/// keeping the first spelling seen
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && !slugify(n).is_empty())
        .filter(|n| seen.insert(slugify(n)))
        .map(str::to_string)
        .collect()
}
