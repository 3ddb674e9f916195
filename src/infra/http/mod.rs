pub mod auth;
mod feed;
mod follows;
mod media;
mod middleware;
mod posts;

pub use auth::{CurrentUser, MaybeUser, SESSION_COOKIE};

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        accounts::AccountService,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follows::FollowService,
        posts::PostService,
        repos::{HealthRepo, RepoError},
    },
    cache::{CacheState, page_cache_layer},
    domain::entities::UserRecord,
    infra::uploads::ImageStorage,
    presentation::views::render_not_found_response,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub images: Arc<ImageStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<CacheState>,
    pub max_request_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // The global feed is the only cached surface; everything else renders
    // per request.
    let cached_routes = Router::new().route("/", get(feed::index));

    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(axum_middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        cached_routes
    };

    let routes = Router::new()
        .route("/group/{slug}", get(feed::group_index))
        .route("/profile/{username}", get(feed::profile))
        .route("/follow", get(feed::following_index))
        .route("/create", get(posts::create_form).post(posts::create))
        .route("/posts/{id}", get(posts::detail))
        .route("/posts/{id}/edit", get(posts::edit_form).post(posts::edit))
        .route("/posts/{id}/comment", post(posts::add_comment))
        .route("/profile/{username}/follow", post(follows::follow))
        .route("/profile/{username}/unfollow", post(follows::unfollow))
        .route("/auth/signup", get(auth::signup_form).post(auth::signup))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/media/{*path}", get(media::serve_media))
        .route("/_health/db", get(db_health));

    let max_request_bytes = state.max_request_bytes;

    cached_routes
        .merge(routes)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn not_found(MaybeUser(user): MaybeUser) -> Response {
    render_not_found_response(user.as_ref())
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Unknown group or author renders the not-found page; repository failures
/// surface as plain HTTP errors.
fn feed_error_to_response(err: FeedError, viewer: Option<&UserRecord>) -> Response {
    match err {
        FeedError::UnknownGroup => {
            let mut response = render_not_found_response(viewer);
            ErrorReport::from_message(
                "infra::http::feed_error_to_response",
                StatusCode::NOT_FOUND,
                "Unknown group",
            )
            .attach(&mut response);
            response
        }
        FeedError::UnknownUser => {
            let mut response = render_not_found_response(viewer);
            ErrorReport::from_message(
                "infra::http::feed_error_to_response",
                StatusCode::NOT_FOUND,
                "Unknown user",
            )
            .attach(&mut response);
            response
        }
        err => HttpError::from(err).into_response(),
    }
}
