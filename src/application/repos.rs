//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    CommentRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which slice of the post table a feed query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedQueryScope {
    /// Every post, any author or group.
    Global,
    /// Posts assigned to one group.
    Group(Uuid),
    /// Posts written by one author.
    Author(Uuid),
    /// Posts whose author is followed by the given user.
    FollowedBy(Uuid),
}

/// Lightweight group reference carried on feed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

/// A post as it appears in a feed listing, joined with its author and group.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub post: PostRecord,
    pub author_username: String,
    pub group: Option<GroupRef>,
    pub comment_count: u64,
}

/// A comment joined with its author's username for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentEntry {
    pub comment: CommentRecord,
    pub author_username: String,
}

#[derive(Debug, Clone)]
pub struct NewUserParams {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPostParams {
    pub text: String,
    pub image_path: Option<String>,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
}

/// Author and creation timestamp are deliberately absent: they are immutable.
///
/// `image_path` of `None` keeps the stored image untouched.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// List feed entries for a scope, newest first, ties broken by id.
    async fn list_feed(
        &self,
        scope: FeedQueryScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<FeedEntry>, RepoError>;

    async fn count_feed(&self, scope: FeedQueryScope) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Record that `user_id` follows `author_id`. Returns `false` when the
    /// pair already existed; duplicate inserts are absorbed, never surfaced.
    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Remove the follow relation. Returns `false` when nothing was stored.
    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError>;

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
