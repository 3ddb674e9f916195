//! Session cookie extraction plus signup, login, and logout handlers.

use axum::{
    extract::{Form, FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        accounts::{AccountError, SessionToken},
        error::HttpError,
    },
    domain::entities::UserRecord,
    presentation::views::{
        LayoutContext, LoginContext, LoginTemplate, SignupContext, SignupTemplate,
        render_template_response,
    },
};

use super::HttpState;

pub const SESSION_COOKIE: &str = "foglio_session";

/// The signed-in user, when the request carries a live session cookie.
/// Anonymous requests extract as `MaybeUser(None)`.
pub struct MaybeUser(pub Option<UserRecord>);

/// The signed-in user; anonymous requests are redirected to the login form
/// with a `next` parameter pointing back at the requested page.
pub struct CurrentUser(pub UserRecord);

async fn resolve_user(parts: &Parts, state: &HttpState) -> Option<UserRecord> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE)?;
    state.accounts.authenticate(cookie.value()).await
}

impl FromRequestParts<HttpState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(parts, state).await))
    }
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_user(parts, state).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let next = parts.uri.path();
                Err(Redirect::to(&format!("/auth/login?next={next}")).into_response())
            }
        }
    }
}

/// Only same-site absolute paths are followable after login; anything else
/// falls back to the feed.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

fn session_cookie(token: &SessionToken) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.cookie_value()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn account_error_to_http(source: &'static str, err: AccountError) -> HttpError {
    match err {
        AccountError::Repo(repo) => super::repo_error_to_http(source, repo),
        other => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Account operation failed",
            other.to_string(),
        ),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NextQuery {
    next: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: String,
}

pub async fn signup_form(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    let view = LayoutContext::new(None, SignupContext::default());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub async fn signup(State(state): State<HttpState>, Form(form): Form<SignupForm>) -> Response {
    match state
        .accounts
        .signup(&form.username, &form.email, &form.password)
        .await
    {
        Ok((_, token)) => {
            let jar = CookieJar::new().add(session_cookie(&token));
            (jar, Redirect::to("/")).into_response()
        }
        Err(AccountError::Invalid(errors)) => {
            let view = LayoutContext::new(
                None,
                SignupContext {
                    username: form.username,
                    email: form.email,
                    username_error: errors.username,
                    email_error: errors.email,
                    password_error: errors.password,
                },
            );
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(AccountError::UsernameTaken) => {
            let view = LayoutContext::new(
                None,
                SignupContext {
                    username: form.username,
                    email: form.email,
                    username_error: Some("Username is already taken"),
                    ..Default::default()
                },
            );
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error_to_http("infra::http::auth::signup", err).into_response(),
    }
}

pub async fn login_form(MaybeUser(user): MaybeUser, Query(query): Query<NextQuery>) -> Response {
    if user.is_some() {
        return Redirect::to(safe_next(&query.next)).into_response();
    }

    let view = LayoutContext::new(
        None,
        LoginContext {
            next: query.next,
            ..Default::default()
        },
    );
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub async fn login(State(state): State<HttpState>, Form(form): Form<LoginForm>) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok((_, token)) => {
            let jar = CookieJar::new().add(session_cookie(&token));
            (jar, Redirect::to(safe_next(&form.next))).into_response()
        }
        Err(AccountError::BadCredentials) => {
            let view = LayoutContext::new(
                None,
                LoginContext {
                    username: form.username,
                    next: form.next,
                    error: Some("Username and password did not match"),
                },
            );
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error_to_http("infra::http::auth::login", err).into_response(),
    }
}

pub async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        warn!(
            target = "foglio::accounts",
            error = %err,
            "failed to delete session on logout",
        );
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, Redirect::to("/")).into_response()
}
