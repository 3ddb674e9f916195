//! Follow and unfollow actions between users.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("users cannot follow themselves")]
    SelfFollow,
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Make `viewer` follow the author named `target_username`.
    ///
    /// Following an already-followed author is a no-op, not a duplicate;
    /// following yourself is a validation error.
    pub async fn follow(
        &self,
        viewer: &UserRecord,
        target_username: &str,
    ) -> Result<UserRecord, FollowError> {
        let target = self.resolve(target_username).await?;
        if target.id == viewer.id {
            return Err(FollowError::SelfFollow);
        }

        let created = self.follows.insert_follow(viewer.id, target.id).await?;
        debug!(
            target = "foglio::follows",
            follower = %viewer.username,
            author = %target.username,
            created,
            "follow",
        );
        Ok(target)
    }

    /// Remove the follow relation; absence is not an error.
    pub async fn unfollow(
        &self,
        viewer: &UserRecord,
        target_username: &str,
    ) -> Result<UserRecord, FollowError> {
        let target = self.resolve(target_username).await?;

        let removed = self.follows.delete_follow(viewer.id, target.id).await?;
        debug!(
            target = "foglio::follows",
            follower = %viewer.username,
            author = %target.username,
            removed,
            "unfollow",
        );
        Ok(target)
    }

    async fn resolve(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownUser)
    }
}
