//! Post pages: detail, creation, author-only editing, and commenting.

use axum::{
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        posts::{
            CommentError, EditOutcome, PostDetail, PostError, PostFieldErrors, PostInput,
            validate_post_input,
        },
    },
    domain::entities::UserRecord,
    infra::uploads::ImageStorageError,
    presentation::views::{
        CommentView, GroupBadge, LayoutContext, PostDetailPageContext, PostDetailTemplate,
        PostFormContext, PostFormTemplate, render_not_found_response, render_template_response,
    },
};

use super::{CurrentUser, HttpState, MaybeUser, repo_error_to_http};

fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn detail_href(post_id: Uuid) -> String {
    format!("/posts/{post_id}")
}

fn detail_context(
    detail: &PostDetail,
    viewer: Option<&UserRecord>,
    comment_error: Option<&'static str>,
    comment_text: String,
) -> PostDetailPageContext {
    let author = &detail.author.username;
    PostDetailPageContext {
        text: detail.post.text.clone(),
        author_username: author.clone(),
        author_href: format!("/profile/{author}"),
        author_post_count: detail.author_post_count,
        group: detail.group.as_ref().map(|group| GroupBadge {
            title: group.title.clone(),
            href: format!("/group/{}", group.slug),
        }),
        image_src: detail
            .post
            .image_path
            .as_ref()
            .map(|path| format!("/media/{path}")),
        published: crate::presentation::views::published_at(detail.post.created_at),
        can_edit: viewer.is_some_and(|viewer| viewer.id == detail.post.author_id),
        edit_href: format!("/posts/{}/edit", detail.post.id),
        comments: detail.comments.iter().map(CommentView::from).collect(),
        comment_action: format!("/posts/{}/comment", detail.post.id),
        comment_error,
        comment_text,
        viewer_signed_in: viewer.is_some(),
    }
}

async fn render_detail(
    state: &HttpState,
    viewer: Option<&UserRecord>,
    post_id: Uuid,
    comment_error: Option<&'static str>,
    comment_text: String,
) -> Response {
    match state.posts.post_detail(post_id).await {
        Ok(detail) => {
            let content = detail_context(&detail, viewer, comment_error, comment_text);
            let view = LayoutContext::new(viewer, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(PostError::UnknownPost) => render_not_found_response(viewer),
        Err(PostError::Repo(err)) => {
            repo_error_to_http("infra::http::posts::render_detail", err).into_response()
        }
        Err(err) => HttpError::new(
            "infra::http::posts::render_detail",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to render post",
            err.to_string(),
        )
        .into_response(),
    }
}

pub async fn detail(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(user.as_ref());
    };

    render_detail(&state, user.as_ref(), post_id, None, String::new()).await
}

/// Everything a post form submission carries. The raw group value is kept
/// as a string so an unparsable selection becomes a field error instead of
/// a rejected request.
#[derive(Debug, Default)]
struct PostFormData {
    text: String,
    group_raw: String,
    image: Option<(String, Bytes)>,
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormData, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";

    let mut data = PostFormData::default();
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid form data",
            err.to_string(),
        )
    })? {
        match field.name() {
            Some("text") => {
                data.text = field.text().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Invalid form data",
                        err.to_string(),
                    )
                })?;
            }
            Some("group") => {
                data.group_raw = field
                    .text()
                    .await
                    .map_err(|err| {
                        HttpError::new(
                            SOURCE,
                            StatusCode::BAD_REQUEST,
                            "Invalid form data",
                            err.to_string(),
                        )
                    })?
                    .trim()
                    .to_string();
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|name| name.to_string())
                    .filter(|name| !name.trim().is_empty());
                let bytes = field.bytes().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Invalid form data",
                        err.to_string(),
                    )
                })?;
                if let Some(name) = filename
                    && !bytes.is_empty()
                {
                    data.image = Some((name, bytes));
                }
            }
            _ => {}
        }
    }

    Ok(data)
}

fn parse_group(raw: &str) -> Result<Option<Uuid>, &'static str> {
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| "Select a valid group")
}

/// Persist an uploaded image, turning rejected payloads into a field error.
async fn store_image(
    state: &HttpState,
    image: Option<(String, Bytes)>,
) -> Result<(Option<String>, Option<&'static str>), HttpError> {
    let Some((name, bytes)) = image else {
        return Ok((None, None));
    };

    match state.images.store(&name, bytes).await {
        Ok(stored) => Ok((Some(stored.stored_path), None)),
        Err(ImageStorageError::NotAnImage | ImageStorageError::EmptyPayload) => {
            Ok((None, Some("Upload a valid image file")))
        }
        Err(err) => Err(HttpError::new(
            "infra::http::posts::store_image",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded image",
            err.to_string(),
        )),
    }
}

/// Best-effort removal of a stored image no post references anymore.
async fn discard_image(state: &HttpState, stored_path: &str) {
    if let Err(err) = state.images.delete(stored_path).await {
        warn!(
            target = "foglio::http",
            path = stored_path,
            error = %err,
            "failed to remove unreferenced image",
        );
    }
}

struct FormChrome {
    heading: &'static str,
    submit_label: &'static str,
    action_href: String,
}

impl FormChrome {
    fn create() -> Self {
        Self {
            heading: "New post",
            submit_label: "Create",
            action_href: "/create".to_string(),
        }
    }

    fn edit(post_id: Uuid) -> Self {
        Self {
            heading: "Edit post",
            submit_label: "Save",
            action_href: format!("/posts/{post_id}/edit"),
        }
    }
}

async fn render_post_form(
    state: &HttpState,
    viewer: &UserRecord,
    chrome: FormChrome,
    text: String,
    selected_group: Option<Uuid>,
    errors: PostFieldErrors,
) -> Response {
    let groups = match state.posts.list_groups().await {
        Ok(groups) => groups,
        Err(err) => {
            return repo_error_to_http("infra::http::posts::render_post_form", err)
                .into_response();
        }
    };

    let content = PostFormContext {
        heading: chrome.heading,
        submit_label: chrome.submit_label,
        action_href: chrome.action_href,
        text,
        groups: PostFormContext::groups_from(&groups, selected_group),
        text_error: errors.text,
        group_error: errors.group,
        image_error: errors.image,
    };
    let view = LayoutContext::new(Some(viewer), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub async fn create_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    render_post_form(
        &state,
        &user,
        FormChrome::create(),
        String::new(),
        None,
        PostFieldErrors::default(),
    )
    .await
}

pub async fn create(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Response {
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let text_error = validate_post_input(&form.text).text;
    let (group_id, group_error) = match parse_group(&form.group_raw) {
        Ok(group_id) => (group_id, None),
        Err(message) => (None, Some(message)),
    };

    // Validate before touching the filesystem so a rejected form never
    // leaves an orphaned upload behind.
    if text_error.is_some() || group_error.is_some() {
        let errors = PostFieldErrors {
            text: text_error,
            group: group_error,
            image: None,
        };
        return render_post_form(&state, &user, FormChrome::create(), form.text, None, errors)
            .await;
    }

    let (image_path, image_error) = match store_image(&state, form.image).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    if image_error.is_some() {
        let errors = PostFieldErrors {
            image: image_error,
            ..Default::default()
        };
        return render_post_form(&state, &user, FormChrome::create(), form.text, group_id, errors)
            .await;
    }

    let stored_image = image_path.clone();
    let input = PostInput {
        text: form.text.clone(),
        group_id,
        image_path,
    };

    match state.posts.create_post(user.id, input).await {
        Ok(_) => Redirect::to(&format!("/profile/{}", user.username)).into_response(),
        Err(err) => {
            if let Some(path) = stored_image.as_deref() {
                discard_image(&state, path).await;
            }
            match err {
                PostError::Invalid(errors) => {
                    render_post_form(
                        &state,
                        &user,
                        FormChrome::create(),
                        form.text,
                        group_id,
                        errors,
                    )
                    .await
                }
                PostError::UnknownGroup => {
                    let errors = PostFieldErrors {
                        group: Some("Select a valid group"),
                        ..Default::default()
                    };
                    render_post_form(&state, &user, FormChrome::create(), form.text, None, errors)
                        .await
                }
                PostError::UnknownPost => render_not_found_response(Some(&user)),
                PostError::Repo(err) => {
                    repo_error_to_http("infra::http::posts::create", err).into_response()
                }
            }
        }
    }
}

pub async fn edit_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(Some(&user));
    };

    let post = match state.posts.find_post(post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => return render_not_found_response(Some(&user)),
        Err(err) => {
            return repo_error_to_http("infra::http::posts::edit_form", err).into_response();
        }
    };

    // Only the author sees the edit form; everyone else lands on the post.
    if post.author_id != user.id {
        return Redirect::to(&detail_href(post_id)).into_response();
    }

    render_post_form(
        &state,
        &user,
        FormChrome::edit(post_id),
        post.text,
        post.group_id,
        PostFieldErrors::default(),
    )
    .await
}

pub async fn edit(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(Some(&user));
    };

    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let previous = match state.posts.find_post(post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => return render_not_found_response(Some(&user)),
        Err(err) => {
            return repo_error_to_http("infra::http::posts::edit", err).into_response();
        }
    };

    let text_error = validate_post_input(&form.text).text;
    let (group_id, group_error) = match parse_group(&form.group_raw) {
        Ok(group_id) => (group_id, None),
        Err(message) => (None, Some(message)),
    };

    // Validate before touching the filesystem so a rejected form never
    // leaves an orphaned upload behind.
    if text_error.is_some() || group_error.is_some() {
        let errors = PostFieldErrors {
            text: text_error,
            group: group_error,
            image: None,
        };
        return render_post_form(
            &state,
            &user,
            FormChrome::edit(post_id),
            form.text,
            None,
            errors,
        )
        .await;
    }

    let (image_path, image_error) = match store_image(&state, form.image).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    if image_error.is_some() {
        let errors = PostFieldErrors {
            image: image_error,
            ..Default::default()
        };
        return render_post_form(
            &state,
            &user,
            FormChrome::edit(post_id),
            form.text,
            group_id,
            errors,
        )
        .await;
    }

    let stored_image = image_path.clone();
    let input = PostInput {
        text: form.text.clone(),
        group_id,
        // None keeps the stored image.
        image_path,
    };

    match state.posts.edit_post(user.id, post_id, input).await {
        Ok(EditOutcome::Updated(post)) => {
            // A replacement leaves the previous file unreferenced.
            if stored_image.is_some()
                && let Some(old) = previous.image_path.as_deref()
            {
                discard_image(&state, old).await;
            }
            Redirect::to(&detail_href(post.id)).into_response()
        }
        Ok(EditOutcome::NotAuthor(post)) => {
            if let Some(path) = stored_image.as_deref() {
                discard_image(&state, path).await;
            }
            Redirect::to(&detail_href(post.id)).into_response()
        }
        Err(err) => {
            if let Some(path) = stored_image.as_deref() {
                discard_image(&state, path).await;
            }
            match err {
                PostError::Invalid(errors) => {
                    render_post_form(
                        &state,
                        &user,
                        FormChrome::edit(post_id),
                        form.text,
                        group_id,
                        errors,
                    )
                    .await
                }
                PostError::UnknownGroup => {
                    let errors = PostFieldErrors {
                        group: Some("Select a valid group"),
                        ..Default::default()
                    };
                    render_post_form(
                        &state,
                        &user,
                        FormChrome::edit(post_id),
                        form.text,
                        None,
                        errors,
                    )
                    .await
                }
                PostError::UnknownPost => render_not_found_response(Some(&user)),
                PostError::Repo(err) => {
                    repo_error_to_http("infra::http::posts::edit", err).into_response()
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    text: String,
}

pub async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(Some(&user));
    };

    match state.posts.add_comment(user.id, post_id, form.text.clone()).await {
        Ok(_) => Redirect::to(&detail_href(post_id)).into_response(),
        Err(CommentError::Invalid(message)) => {
            render_detail(&state, Some(&user), post_id, Some(message), form.text).await
        }
        Err(CommentError::UnknownPost) => render_not_found_response(Some(&user)),
        Err(CommentError::Repo(err)) => {
            repo_error_to_http("infra::http::posts::add_comment", err).into_response()
        }
    }
}
