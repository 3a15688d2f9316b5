//! Database repositories
//!
//! One repository per aggregate. Each exposes an async trait and a
//! `Sqlx*Repository` that dispatches to SQLite or MySQL queries.

pub mod author;
pub mod book;
pub mod comment;
pub mod follow;
pub mod library;
pub mod like;
pub mod notification;
pub mod post;
pub mod session;
pub mod user;

pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use book::{BookRepository, SqlxBookRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use library::{LibraryRepository, SqlxLibraryRepository};
pub use like::{LikeRepository, SqlxLikeRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Lowercased `%term%` pattern for `LOWER(col) LIKE ? ESCAPE '!'`
///
/// `%`, `_` and `!` in the input are escaped so they match literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}


#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" Rust "), "%rust%");
        assert_eq!(like_pattern("100%_done!"), "%100!%!_done!!%");
    }
}
