//! Feed pages: global index, group, profile, and following.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use crate::presentation::views::{
    FeedPageContext, FollowTemplate, GroupTemplate, IndexTemplate, LayoutContext, PaginatorView,
    PostCard, ProfilePageContext, ProfileTemplate, render_template_response,
};

use super::{CurrentUser, HttpState, MaybeUser, feed_error_to_response};

/// Page numbers arrive as raw strings; anything non-numeric is treated as
/// a missing parameter and clamps to page 1.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn page(&self) -> Option<u32> {
        self.page.as_deref().and_then(|raw| raw.parse().ok())
    }
}

pub async fn index(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.global_feed(query.page()).await {
        Ok(posts) => {
            let content = FeedPageContext::new("Latest posts", None, "/", &posts);
            let view = LayoutContext::new(user.as_ref(), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, user.as_ref()),
    }
}

pub async fn group_index(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_feed(&slug, query.page()).await {
        Ok(feed) => {
            let subheading =
                (!feed.group.description.is_empty()).then(|| feed.group.description.clone());
            let content = FeedPageContext::new(
                feed.group.title.clone(),
                subheading,
                &format!("/group/{slug}"),
                &feed.posts,
            );
            let view = LayoutContext::new(user.as_ref(), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, user.as_ref()),
    }
}

pub async fn profile(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = user.as_ref().map(|viewer| viewer.id);

    match state
        .feed
        .profile_feed(&username, viewer_id, query.page())
        .await
    {
        Ok(feed) => {
            let author = &feed.author.username;
            let content = ProfilePageContext {
                username: author.clone(),
                post_count: feed.post_count,
                following: feed.following,
                follow_href: format!("/profile/{author}/follow"),
                unfollow_href: format!("/profile/{author}/unfollow"),
                posts: feed.posts.items.iter().map(PostCard::from).collect(),
                paginator: PaginatorView::new(&format!("/profile/{author}"), &feed.posts),
            };
            let view = LayoutContext::new(user.as_ref(), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, user.as_ref()),
    }
}

pub async fn following_index(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.following_feed(user.id, query.page()).await {
        Ok(posts) => {
            let content = FeedPageContext::new("Following", None, "/follow", &posts);
            let view = LayoutContext::new(Some(&user), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, Some(&user)),
    }
}
