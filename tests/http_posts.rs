//! Post creation, author-only editing, images, and comments through the
//! full HTTP surface.

mod common;

use axum::http::StatusCode;
use common::*;

const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[tokio::test]
async fn create_requires_login() {
    let app = test_app();

    let response = get(&app.router, "/create").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?next=/create");
}

#[tokio::test]
async fn created_post_lands_on_profile_and_global_feed() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("hello from leo", "", None);
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo");

    let body = body_string(get(&app.router, "/").await).await;
    assert!(body.contains("hello from leo"));

    let body = body_string(get(&app.router, "/profile/leo").await).await;
    assert!(body.contains("hello from leo"));
}

#[tokio::test]
async fn blank_text_re_renders_form_with_field_error() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("   ", "", None);
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Post text must not be empty"));

    // Nothing was stored.
    let body = body_string(get(&app.router, "/").await).await;
    assert_eq!(count_occurrences(&body, "post-card"), 0);
}

#[tokio::test]
async fn post_can_join_a_group_from_the_form() {
    let app = test_app();
    let cats = app.store.add_group("Cats", "cats", "");
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("a cat post", &cats.id.to_string(), None);
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = body_string(get(&app.router, "/group/cats").await).await;
    assert!(body.contains("a cat post"));
}

#[tokio::test]
async fn uploaded_image_is_stored_and_served() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("with a picture", "", Some(("photo.png", TINY_PNG)));
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = body_string(get(&app.router, "/").await).await;
    let src_start = body.find("/media/").expect("feed shows the image");
    let src_end = body[src_start..].find('"').expect("quoted src") + src_start;
    let src = &body[src_start..src_end];

    let response = get(&app.router, src).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
    let bytes = body_bytes(response).await;
    assert_eq!(bytes, TINY_PNG);
}

#[tokio::test]
async fn non_image_upload_becomes_a_field_error() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("some text", "", Some(("notes.txt", b"just text")));
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Upload a valid image file"));
    // The entered text survives the re-render.
    assert!(body.contains("some text"));
}

#[tokio::test]
async fn rejected_form_leaves_no_stored_image() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("   ", "", Some(("photo.png", TINY_PNG)));
    let response = post_multipart(&app.router, "/create", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Post text must not be empty"));

    assert_eq!(file_count(&app.media_root), 0);
}

#[tokio::test]
async fn replacing_an_image_removes_the_old_file() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("with a picture", "", Some(("photo.png", TINY_PNG)));
    post_multipart(&app.router, "/create", &cookie, body).await;

    let feed = body_string(get(&app.router, "/").await).await;
    let post_id = extract_post_id(&feed);
    let old_src = extract_media_src(&feed);

    let body = multipart_form("with a picture", "", Some(("replacement.png", TINY_PNG)));
    let response =
        post_multipart(&app.router, &format!("/posts/{post_id}/edit"), &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Only the replacement remains on disk.
    assert_eq!(file_count(&app.media_root), 1);
    let response = get(&app.router, &old_src).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_can_edit_their_post() {
    let app = test_app();
    let cookie = signup(&app.router, "leo").await;

    let body = multipart_form("first draft", "", None);
    post_multipart(&app.router, "/create", &cookie, body).await;
    let feed = body_string(get(&app.router, "/").await).await;
    let post_id = extract_post_id(&feed);

    let body = multipart_form("second draft", "", None);
    let response =
        post_multipart(&app.router, &format!("/posts/{post_id}/edit"), &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{post_id}"));

    let body = body_string(get(&app.router, &format!("/posts/{post_id}")).await).await;
    assert!(body.contains("second draft"));
    assert!(!body.contains("first draft"));
}

#[tokio::test]
async fn non_author_edit_redirects_without_changing_the_post() {
    let app = test_app();
    let author = app.store.add_user("mia");
    let post = app.store.add_post(author.id, "mia's words", None);

    let cookie = signup(&app.router, "leo").await;

    // The edit form is not shown to non-authors.
    let response = get_with_cookie(
        &app.router,
        &format!("/posts/{}/edit", post.id),
        &cookie,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", post.id));

    // A forged submission is silently dropped.
    let body = multipart_form("rewritten by leo", "", None);
    let response =
        post_multipart(&app.router, &format!("/posts/{}/edit", post.id), &cookie, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", post.id));
    assert_eq!(app.store.post_text(post.id).as_deref(), Some("mia's words"));
}

#[tokio::test]
async fn comments_require_login_and_render_on_the_detail_page() {
    let app = test_app();
    let author = app.store.add_user("mia");
    let post = app.store.add_post(author.id, "mia's post", None);

    let response = post_form(
        &app.router,
        &format!("/posts/{}/comment", post.id),
        None,
        "text=nice",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login"));

    let cookie = signup(&app.router, "leo").await;
    let response = post_form(
        &app.router,
        &format!("/posts/{}/comment", post.id),
        Some(&cookie),
        "text=nice+one",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", post.id));

    let body = body_string(get(&app.router, &format!("/posts/{}", post.id)).await).await;
    assert!(body.contains("nice one"));
    assert!(body.contains("leo"));
}

#[tokio::test]
async fn blank_comment_re_renders_detail_with_error() {
    let app = test_app();
    let author = app.store.add_user("mia");
    let post = app.store.add_post(author.id, "mia's post", None);
    let cookie = signup(&app.router, "leo").await;

    let response = post_form(
        &app.router,
        &format!("/posts/{}/comment", post.id),
        Some(&cookie),
        "text=+++",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Comment text must not be empty"));
    assert!(body.contains("mia&#x27;s post") || body.contains("mia's post"));
}

#[tokio::test]
async fn unknown_post_detail_is_not_found() {
    let app = test_app();

    let response = get(
        &app.router,
        "/posts/00000000-0000-0000-0000-000000000001",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Non-UUID ids are a plain 404, not a parse failure.
    let response = get(&app.router, "/posts/42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Pull the first post id out of a rendered feed page.
fn extract_post_id(body: &str) -> String {
    let start =
        body.find("href=\"/posts/").expect("feed links a post") + "href=\"/posts/".len();
    body[start..start + 36].to_string()
}

/// Pull the first `/media/...` image src out of a rendered page.
fn extract_media_src(body: &str) -> String {
    let start = body.find("/media/").expect("page shows an image");
    let end = body[start..].find('"').expect("quoted src") + start;
    body[start..end].to_string()
}
