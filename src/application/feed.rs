//! Feed composition: ordered, paginated post listings per scope.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Pager, Paginated};
use crate::application::repos::{
    FeedEntry, FeedQueryScope, FollowsRepo, GroupsRepo, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// One page of the group-scoped feed.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub posts: Paginated<FeedEntry>,
}

/// One page of an author's profile feed, plus the viewer's follow state.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub post_count: u64,
    /// `None` for anonymous viewers and for the author's own profile.
    pub following: Option<bool>,
    pub posts: Paginated<FeedEntry>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    pager: Pager,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        pager: Pager,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            pager,
        }
    }

    pub fn pager(&self) -> Pager {
        self.pager
    }

    /// All posts, newest first.
    pub async fn global_feed(&self, page: Option<u32>) -> Result<Paginated<FeedEntry>, FeedError> {
        self.scoped_page(FeedQueryScope::Global, page).await
    }

    /// Posts of the group addressed by `slug`.
    pub async fn group_feed(&self, slug: &str, page: Option<u32>) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let posts = self.scoped_page(FeedQueryScope::Group(group.id), page).await?;
        Ok(GroupFeed { group, posts })
    }

    /// Posts by the author addressed by `username`, with the viewer's
    /// follow state when it is meaningful.
    pub async fn profile_feed(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: Option<u32>,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let posts = self
            .scoped_page(FeedQueryScope::Author(author.id), page)
            .await?;
        let post_count = posts.total;

        let following = match viewer {
            Some(viewer_id) if viewer_id != author.id => {
                Some(self.follows.is_following(viewer_id, author.id).await?)
            }
            _ => None,
        };

        Ok(ProfileFeed {
            author,
            post_count,
            following,
            posts,
        })
    }

    /// Posts by every author the viewer follows. An empty follow set is an
    /// empty feed, not an error.
    pub async fn following_feed(
        &self,
        viewer: Uuid,
        page: Option<u32>,
    ) -> Result<Paginated<FeedEntry>, FeedError> {
        self.scoped_page(FeedQueryScope::FollowedBy(viewer), page)
            .await
    }

    async fn scoped_page(
        &self,
        scope: FeedQueryScope,
        page: Option<u32>,
    ) -> Result<Paginated<FeedEntry>, FeedError> {
        let total = self.posts.count_feed(scope).await?;
        let page = self.pager.clamp_page(page, total);
        let offset = self.pager.offset(page);

        let items = self
            .posts
            .list_feed(scope, self.pager.page_size(), offset)
            .await?;

        Ok(Paginated::new(items, page, self.pager, total))
    }
}
