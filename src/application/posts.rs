//! Post and comment mutation: creation, author-only editing, commenting.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CommentEntry, CommentsRepo, GroupsRepo, NewCommentParams, NewPostParams, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

/// Field-level validation outcome for the post form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFieldErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
    pub image: Option<&'static str>,
}

impl PostFieldErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

/// Validate post form fields. Standalone so handlers can re-render forms
/// with per-field messages without constructing a service error first.
pub fn validate_post_input(text: &str) -> PostFieldErrors {
    let mut errors = PostFieldErrors::default();
    if text.trim().is_empty() {
        errors.text = Some("Post text must not be empty");
    }
    errors
}

/// Validate comment text the same way.
pub fn validate_comment_text(text: &str) -> Option<&'static str> {
    text.trim()
        .is_empty()
        .then_some("Comment text must not be empty")
}

#[derive(Debug, Clone)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<Uuid>,
    /// Stored path of a freshly uploaded image; `None` keeps the current one.
    pub image_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post form validation failed")]
    Invalid(PostFieldErrors),
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment validation failed: {0}")]
    Invalid(&'static str),
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of an edit attempt. Non-authors are not an error: the handler
/// silently redirects them to the post detail view.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(PostRecord),
    NotAuthor(PostRecord),
}

/// Everything the post detail view renders.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author: UserRecord,
    pub group: Option<GroupRecord>,
    pub author_post_count: u64,
    pub comments: Vec<CommentEntry>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            comments,
            groups,
            users,
        }
    }

    /// Create a post for `author_id`. The creation timestamp is assigned by
    /// the storage layer and never changes afterwards.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let errors = validate_post_input(&input.text);
        if !errors.is_empty() {
            return Err(PostError::Invalid(errors));
        }

        if let Some(group_id) = input.group_id
            && self.groups.find_by_id(group_id).await?.is_none()
        {
            return Err(PostError::UnknownGroup);
        }

        let post = self
            .posts_write
            .create_post(NewPostParams {
                text: input.text,
                image_path: input.image_path,
                author_id,
                group_id: input.group_id,
            })
            .await?;

        Ok(post)
    }

    /// Apply an edit if `editor_id` is the author; otherwise report
    /// `NotAuthor` with the untouched post.
    pub async fn edit_post(
        &self,
        editor_id: Uuid,
        post_id: Uuid,
        input: PostInput,
    ) -> Result<EditOutcome, PostError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        if post.author_id != editor_id {
            return Ok(EditOutcome::NotAuthor(post));
        }

        let errors = validate_post_input(&input.text);
        if !errors.is_empty() {
            return Err(PostError::Invalid(errors));
        }

        if let Some(group_id) = input.group_id
            && self.groups.find_by_id(group_id).await?.is_none()
        {
            return Err(PostError::UnknownGroup);
        }

        let updated = self
            .posts_write
            .update_post(UpdatePostParams {
                id: post.id,
                text: input.text,
                group_id: input.group_id,
                image_path: input.image_path,
            })
            .await?;

        Ok(EditOutcome::Updated(updated))
    }

    pub async fn post_detail(&self, post_id: Uuid) -> Result<PostDetail, PostError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        let author = self
            .users
            .find_by_id(post.author_id)
            .await?
            .ok_or(PostError::Repo(RepoError::Integrity {
                message: format!("post {} references missing author", post.id),
            }))?;

        let group = match post.group_id {
            Some(group_id) => self.groups.find_by_id(group_id).await?,
            None => None,
        };

        let author_post_count = self
            .posts
            .count_feed(crate::application::repos::FeedQueryScope::Author(author.id))
            .await?;

        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetail {
            post,
            author,
            group,
            author_post_count,
            comments,
        })
    }

    pub async fn find_post(&self, post_id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.posts.find_by_id(post_id).await
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_all().await
    }

    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        text: String,
    ) -> Result<CommentRecord, CommentError> {
        if let Some(message) = validate_comment_text(&text) {
            return Err(CommentError::Invalid(message));
        }

        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(CommentError::UnknownPost);
        }

        let comment = self
            .comments
            .create_comment(NewCommentParams {
                post_id,
                author_id,
                text,
            })
            .await?;

        Ok(comment)
    }
}
