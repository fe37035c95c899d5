mod client;
mod config;
mod error;
mod handlers;
mod memory_store;
mod models;
mod paginator;
mod server;
#[cfg(feature = "sqlite")]
mod sqlite_store;
mod store;
mod validation;

pub use client::{ApiClient, ClientError, GENERIC_FAILURE};
pub use config::{share_link, Config, ConfigError};
pub use error::{ApiError, StoreError};
pub use memory_store::MemoryStore;
pub use models::{
    Author, Comment, CommentId, FeedPage, Message, NewComment, NewPost, NewVerificationRequest,
    Outcome, OutcomeWith, Page, Post, PostId, PostPayload, PostSummary, SearchResult, Session,
    User, UserId, UserPayload, UserProfile, VerificationBody, VerificationRequest,
};
pub use paginator::{
    FeedPaginator, FeedStatus, FeedTrigger, FetchOutcome, PageFetcher, PageTicket, SkipReason,
    StoreFetcher,
};
pub use server::{routes, session, Site, SESSION_HEADER};
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;
pub use store::PostStore;
pub use validation::{
    CommentContent, FieldError, PostContent, BIO_MAX, COMMENT_CONTENT_MAX, OCCUPATION_MAX,
    POST_CONTENT_MAX,
};
