//! Follow and unfollow actions. Both redirect back to the author's profile.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::follows::FollowError, presentation::views::render_not_found_response,
};

use super::{CurrentUser, HttpState, repo_error_to_http};

pub async fn follow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(target) => Redirect::to(&format!("/profile/{}", target.username)).into_response(),
        // Self-follow is quietly ignored; the profile just re-renders.
        Err(FollowError::SelfFollow) => {
            Redirect::to(&format!("/profile/{}", user.username)).into_response()
        }
        Err(FollowError::UnknownUser) => render_not_found_response(Some(&user)),
        Err(FollowError::Repo(err)) => {
            repo_error_to_http("infra::http::follows::follow", err).into_response()
        }
    }
}

pub async fn unfollow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(target) => Redirect::to(&format!("/profile/{}", target.username)).into_response(),
        Err(FollowError::SelfFollow) => {
            Redirect::to(&format!("/profile/{}", user.username)).into_response()
        }
        Err(FollowError::UnknownUser) => render_not_found_response(Some(&user)),
        Err(FollowError::Repo(err)) => {
            repo_error_to_http("infra::http::follows::unfollow", err).into_response()
        }
    }
}
