//! Services layer - Business logic
//!
//! Services sit between the API and the repositories. They enforce
//! validation and ownership rules, keep the cache coherent, and emit
//! notifications as side effects.

pub mod author;
pub mod book;
pub mod comment;
pub mod follow;
pub mod library;
pub mod markdown;
pub mod notification;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod user;

pub use author::{AuthorDetail, AuthorService, AuthorServiceError};
pub use book::{BookService, BookServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use follow::{FollowService, FollowServiceError};
pub use library::{LibraryService, LibraryServiceError};
pub use markdown::MarkdownRenderer;
pub use notification::{NotificationPage, NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, Profile, RegisterInput, UserService, UserServiceError};
