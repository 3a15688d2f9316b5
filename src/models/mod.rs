//! Data models
//!
//! Database entities for the catalog, accounts and social features, plus
//! the input and filter types passed between the API, services and
//! repositories.

mod author;
mod book;
mod comment;
mod library;
mod pagination;
mod post;
mod session;
mod social;
mod tag;
mod user;

pub use author::{Author, AuthorInput};
pub use book::{Book, BookFilter, BookOrdering, CreateBookInput, UpdateBookInput};
pub use comment::{Comment, CreateCommentInput};
pub use library::{Librarian, Library, LibraryDetail};
pub use pagination::{ListParams, PagedResult};
pub use post::{CreatePostInput, Post, PostFilter, UpdatePostInput};
pub use session::Session;
pub use social::{Follow, Like, NewNotification, Notification, Target, TargetType};
pub use tag::{normalize_tag_names, slugify, Tag, TagWithCount};
pub use user::{gravatar_url, UpdateProfileInput, User, UserRole, UserSummary};
