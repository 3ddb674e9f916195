//! Shared fixture: an in-memory repository set behind the real router.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use foglio::{
    application::{
        accounts::AccountService,
        feed::FeedService,
        follows::FollowService,
        pagination::Pager,
        posts::PostService,
        repos::{
            CommentEntry, CommentsRepo, FeedEntry, FeedQueryScope, FollowsRepo, GroupRef,
            GroupsRepo, HealthRepo, NewCommentParams, NewPostParams, NewUserParams, PostsRepo,
            PostsWriteRepo, RepoError, SessionsRepo, UsersRepo, UpdatePostParams,
        },
    },
    cache::{CacheConfig, CacheState, Clock, PageStore},
    domain::entities::{
        CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
    },
    infra::{
        http::{HttpState, build_router},
        uploads::ImageStorage,
    },
};

/// Deterministic clock for exercising the page cache TTL without sleeping.
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().expect("clock lock");
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().expect("clock lock")
    }
}

#[derive(Default)]
struct StoreInner {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
    seq: i64,
}

/// In-memory stand-in for the Postgres repositories. Feed ordering matches
/// the SQL: newest first, ties broken by id descending.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_timestamp(inner: &mut StoreInner) -> OffsetDateTime {
        inner.seq += 1;
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(inner.seq)
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            created_at,
        };
        inner.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str, description: &str) -> GroupRecord {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
            created_at,
        };
        inner.groups.push(group.clone());
        group
    }

    pub fn add_post(&self, author_id: Uuid, text: &str, group_id: Option<Uuid>) -> PostRecord {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            image_path: None,
            author_id,
            group_id,
            created_at,
        };
        inner.posts.push(post.clone());
        post
    }

    pub fn add_follow(&self, user_id: Uuid, author_id: Uuid) {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        inner.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at,
        });
    }

    pub fn post_text(&self, post_id: Uuid) -> Option<String> {
        let inner = self.inner.lock().expect("store lock");
        inner
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .map(|post| post.text.clone())
    }

    pub fn follow_count(&self) -> usize {
        self.inner.lock().expect("store lock").follows.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().expect("store lock").sessions.len()
    }

    /// Backdate every session so the next purge removes them all.
    pub fn expire_sessions(&self) {
        let mut inner = self.inner.lock().expect("store lock");
        for session in &mut inner.sessions {
            session.expires_at = OffsetDateTime::UNIX_EPOCH;
        }
    }

    fn feed_posts(inner: &StoreInner, scope: FeedQueryScope) -> Vec<PostRecord> {
        let mut posts: Vec<PostRecord> = inner
            .posts
            .iter()
            .filter(|post| match scope {
                FeedQueryScope::Global => true,
                FeedQueryScope::Group(group_id) => post.group_id == Some(group_id),
                FeedQueryScope::Author(author_id) => post.author_id == author_id,
                FeedQueryScope::FollowedBy(user_id) => inner
                    .follows
                    .iter()
                    .any(|follow| follow.user_id == user_id && follow.author_id == post.author_id),
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
    }

    fn entry(inner: &StoreInner, post: PostRecord) -> FeedEntry {
        let author_username = inner
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|group_id| {
            inner.groups.iter().find(|group| group.id == group_id).map(|group| GroupRef {
                id: group.id,
                title: group.title.clone(),
                slug: group.slug.clone(),
            })
        });
        let comment_count = inner
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .count() as u64;
        FeedEntry {
            post,
            author_username,
            group,
            comment_count,
        }
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let created_at = Self::next_timestamp(&mut inner);
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            email: params.email,
            password_hash: params.password_hash,
            created_at,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.users.iter().find(|user| user.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        let mut groups = inner.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.groups.iter().find(|group| group.id == id).cloned())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_feed(
        &self,
        scope: FeedQueryScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        let posts = Self::feed_posts(&inner, scope);
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|post| Self::entry(&inner, post))
            .collect())
    }

    async fn count_feed(&self, scope: FeedQueryScope) -> Result<u64, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::feed_posts(&inner, scope).len() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.posts.iter().find(|post| post.id == id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: params.text,
            image_path: params.image_path,
            author_id: params.author_id,
            group_id: params.group_id,
            created_at,
        };
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let post = inner
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if let Some(image_path) = params.image_path {
            post.image_path = Some(image_path);
        }
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let created_at = Self::next_timestamp(&mut inner);
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at,
        };
        inner.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        let mut comments: Vec<CommentRecord> = inner
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments
            .into_iter()
            .map(|comment| {
                let author_username = inner
                    .users
                    .iter()
                    .find(|user| user.id == comment.author_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_default();
                CommentEntry {
                    comment,
                    author_username,
                }
            })
            .collect())
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let exists = inner
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id);
        if exists {
            return Ok(false);
        }
        let created_at = Self::next_timestamp(&mut inner);
        inner.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at,
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let before = inner.follows.len();
        inner
            .follows
            .retain(|follow| !(follow.user_id == user_id && follow.author_id == author_id));
        Ok(inner.follows.len() < before)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id))
    }

}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.sessions.push(session);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.sessions.iter().find(|session| session.id == id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.sessions.retain(|session| session.id != id);
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let before = inner.sessions.len();
        inner.sessions.retain(|session| session.expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub accounts: Arc<AccountService>,
    pub cache: Option<Arc<PageStore>>,
    pub media_root: std::path::PathBuf,
    _media: tempfile::TempDir,
}

fn build_app(cache_enabled: bool) -> TestApp {
    let store = MemoryStore::new();
    let repos: Arc<MemoryStore> = Arc::new(store.clone());

    let pager = Pager::new(10);
    let feed = Arc::new(FeedService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        pager,
    ));
    let posts = Arc::new(PostService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
    ));
    let follows = Arc::new(FollowService::new(repos.clone(), repos.clone()));
    let accounts = Arc::new(AccountService::new(
        repos.clone(),
        repos.clone(),
        Duration::from_secs(3600),
    ));

    let media = tempfile::tempdir().expect("media tempdir");
    let images =
        Arc::new(ImageStorage::new(media.path().join("media")).expect("image storage"));

    let clock = Arc::new(ManualClock::new());
    let page_store = cache_enabled.then(|| {
        let config = CacheConfig::default();
        (config.clone(), Arc::new(PageStore::new(&config, clock.clone())))
    });
    let cache = page_store.clone().map(|(config, store)| CacheState { config, store });

    let state = HttpState {
        feed,
        posts,
        follows,
        accounts: accounts.clone(),
        images,
        health: repos,
        cache,
        max_request_bytes: 10 * 1024 * 1024,
    };

    let media_root = media.path().join("media");
    TestApp {
        store,
        router: build_router(state),
        clock,
        accounts,
        cache: page_store.map(|(_, store)| store),
        media_root,
        _media: media,
    }
}

pub fn test_app() -> TestApp {
    build_app(false)
}

pub fn test_app_with_cache() -> TestApp {
    build_app(true)
}

pub async fn get(router: &Router, path: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

pub async fn get_with_cookie(router: &Router, path: &str, cookie: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

pub async fn post_form(
    router: &Router,
    path: &str,
    cookie: Option<&str>,
    form: &str,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = builder.body(Body::from(form.to_string())).expect("request");
    router.clone().oneshot(request).await.expect("response")
}

pub const MULTIPART_BOUNDARY: &str = "testformboundary";

/// Build a `multipart/form-data` body for the post form.
pub fn multipart_form(text: &str, group: &str, image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("text", text), ("group", group)] {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, bytes)) = image {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(
    router: &Router,
    path: &str,
    cookie: &str,
    body: Vec<u8>,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Register an account through the signup form, returning the session
/// cookie in `name=value` form.
pub async fn signup(router: &Router, username: &str) -> String {
    let form = format!(
        "username={username}&email={username}%40example.com&password=passw0rd-{username}"
    );
    let response = post_form(router, "/auth/signup", None, &form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "signup should redirect");
    session_cookie(&response)
}

pub fn session_cookie(response: &Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie is ascii");
    raw.split(';').next().expect("cookie pair").to_string()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("location is ascii")
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Count regular files under `dir`, recursing into date subdirectories.
pub fn file_count(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() { file_count(&path) } else { 1 }
        })
        .sum()
}
