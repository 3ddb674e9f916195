//! View models and askama rendering helpers.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Paginated;
use crate::application::repos::{CommentEntry, FeedEntry};
use crate::domain::entities::{GroupRecord, UserRecord};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<&UserRecord>) -> Response {
    let view = LayoutContext::new(viewer, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in user as the layout shows them.
#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(viewer: Option<&UserRecord>, content: T) -> Self {
        Self {
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
            }),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

/// A post as it appears in a feed listing.
#[derive(Clone)]
pub struct PostCard {
    pub text: String,
    pub author_username: String,
    pub author_href: String,
    pub detail_href: String,
    pub group: Option<GroupBadge>,
    pub image_src: Option<String>,
    pub iso_date: String,
    pub published: String,
    pub comment_count: u64,
}

impl From<&FeedEntry> for PostCard {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            text: entry.post.text.clone(),
            author_username: entry.author_username.clone(),
            author_href: format!("/profile/{}", entry.author_username),
            detail_href: format!("/posts/{}", entry.post.id),
            group: entry.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: format!("/group/{}", group.slug),
            }),
            image_src: entry
                .post
                .image_path
                .as_ref()
                .map(|path| format!("/media/{path}")),
            iso_date: iso_date(entry.post.created_at),
            published: published_at(entry.post.created_at),
            comment_count: entry.comment_count,
        }
    }
}

/// Page navigation links computed server-side so templates stay dumb.
#[derive(Clone)]
pub struct PaginatorView {
    pub page: u32,
    pub page_count: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_href: String,
    pub next_href: String,
}

impl PaginatorView {
    pub fn new<T>(base_path: &str, page: &Paginated<T>) -> Self {
        Self {
            page: page.page,
            page_count: page.page_count,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous_href: format!("{base_path}?page={}", page.previous_page()),
            next_href: format!("{base_path}?page={}", page.next_page()),
        }
    }
}

/// One page of any post feed plus its heading.
#[derive(Clone)]
pub struct FeedPageContext {
    pub heading: String,
    pub subheading: Option<String>,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl FeedPageContext {
    pub fn new(
        heading: impl Into<String>,
        subheading: Option<String>,
        base_path: &str,
        page: &Paginated<FeedEntry>,
    ) -> Self {
        Self {
            heading: heading.into(),
            subheading,
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::new(base_path, page),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedPageContext>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<FeedPageContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedPageContext>,
}

/// A profile page: the author's feed plus follow state.
#[derive(Clone)]
pub struct ProfilePageContext {
    pub username: String,
    pub post_count: u64,
    /// `Some(true|false)` only when a follow button makes sense.
    pub following: Option<bool>,
    pub follow_href: String,
    pub unfollow_href: String,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfilePageContext>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentEntry> for CommentView {
    fn from(entry: &CommentEntry) -> Self {
        Self {
            author_username: entry.author_username.clone(),
            author_href: format!("/profile/{}", entry.author_username),
            text: entry.comment.text.clone(),
            published: published_at(entry.comment.created_at),
        }
    }
}

/// The post detail page.
#[derive(Clone)]
pub struct PostDetailPageContext {
    pub text: String,
    pub author_username: String,
    pub author_href: String,
    pub author_post_count: u64,
    pub group: Option<GroupBadge>,
    pub image_src: Option<String>,
    pub published: String,
    pub can_edit: bool,
    pub edit_href: String,
    pub comments: Vec<CommentView>,
    pub comment_action: String,
    pub comment_error: Option<&'static str>,
    pub comment_text: String,
    pub viewer_signed_in: bool,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailPageContext>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

/// Shared create/edit post form with per-field errors.
#[derive(Clone)]
pub struct PostFormContext {
    pub heading: &'static str,
    pub submit_label: &'static str,
    pub action_href: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub text_error: Option<&'static str>,
    pub group_error: Option<&'static str>,
    pub image_error: Option<&'static str>,
}

impl PostFormContext {
    pub fn groups_from(groups: &[GroupRecord], selected: Option<uuid::Uuid>) -> Vec<GroupOption> {
        groups
            .iter()
            .map(|group| GroupOption {
                id: group.id.to_string(),
                title: group.title.clone(),
                selected: selected == Some(group.id),
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

#[derive(Clone, Default)]
pub struct LoginContext {
    pub username: String,
    pub next: String,
    pub error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

#[derive(Clone, Default)]
pub struct SignupContext {
    pub username: String,
    pub email: String,
    pub username_error: Option<&'static str>,
    pub email_error: Option<&'static str>,
    pub password_error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

fn iso_date(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// Render a timestamp the way feed and detail pages display it.
pub fn published_at(at: OffsetDateTime) -> String {
    let format = format_description!("[day] [month repr:short] [year] [hour]:[minute]");
    at.format(&format).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::Pager;
    use crate::application::repos::GroupRef;
    use crate::domain::entities::PostRecord;
    use uuid::Uuid;

    fn sample_entry() -> FeedEntry {
        FeedEntry {
            post: PostRecord {
                id: Uuid::nil(),
                text: "hello".to_string(),
                image_path: Some("posts/2026/08/25/x.png".to_string()),
                author_id: Uuid::nil(),
                group_id: Some(Uuid::nil()),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            author_username: "leo".to_string(),
            group: Some(GroupRef {
                id: Uuid::nil(),
                title: "Cats".to_string(),
                slug: "cats".to_string(),
            }),
            comment_count: 3,
        }
    }

    #[test]
    fn post_card_builds_hrefs() {
        let card = PostCard::from(&sample_entry());
        assert_eq!(card.author_href, "/profile/leo");
        assert_eq!(
            card.detail_href,
            "/posts/00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(card.group.as_ref().unwrap().href, "/group/cats");
        assert_eq!(
            card.image_src.as_deref(),
            Some("/media/posts/2026/08/25/x.png")
        );
        assert_eq!(card.comment_count, 3);
    }

    #[test]
    fn paginator_links_point_at_adjacent_pages() {
        let pager = Pager::new(10);
        let page = Paginated::new(vec![sample_entry()], 2, pager, 35);
        let paginator = PaginatorView::new("/group/cats", &page);
        assert_eq!(paginator.previous_href, "/group/cats?page=1");
        assert_eq!(paginator.next_href, "/group/cats?page=3");
        assert!(paginator.has_previous);
        assert!(paginator.has_next);
    }
}
