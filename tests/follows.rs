mod common;

use axum::http::StatusCode;
use common::{START, TestApp, body_text, location};

#[tokio::test]
async fn follow_is_idempotent_and_feeds_the_follow_page() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    let (reader, cookie) = app.user("mia").await;
    app.store.add_post(&author, "Followed author writes", None, START);

    for _ in 0..2 {
        let response = app.get("/profile/leo/follow/", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/profile/leo/"));
    }
    assert_eq!(app.store.follow_count(&reader, &author), 1);

    let feed = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert!(feed.contains("Followed author writes"));

    let profile = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(profile.contains("Unfollow"));
}

#[tokio::test]
async fn follow_page_skips_authors_not_followed() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    let (_, cookie) = app.user("mia").await;
    app.store.add_post(&author, "Nobody follows me", None, START);

    let feed = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert!(!feed.contains("Nobody follows me"));
    assert!(feed.contains("No posts yet."));
}

#[tokio::test]
async fn unfollow_removes_the_pair_and_tolerates_repeats() {
    let app = TestApp::new();
    let author = app.store.add_user("leo");
    let (reader, cookie) = app.user("mia").await;
    app.store.add_post(&author, "Soon gone from my feed", None, START);

    app.get("/profile/leo/follow/", Some(&cookie)).await;
    assert_eq!(app.store.follow_count(&reader, &author), 1);

    for _ in 0..2 {
        let response = app.get("/profile/leo/unfollow/", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/profile/leo/"));
    }
    assert_eq!(app.store.follow_count(&reader, &author), 0);

    let feed = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert!(!feed.contains("Soon gone from my feed"));
}

#[tokio::test]
async fn following_yourself_is_a_no_op() {
    let app = TestApp::new();
    let (user, cookie) = app.user("leo").await;

    let response = app.get("/profile/leo/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.follow_count(&user, &user), 0);

    let profile = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(!profile.contains("/profile/leo/follow/"));
}

#[tokio::test]
async fn following_an_unknown_author_is_not_found() {
    let app = TestApp::new();
    let (_, cookie) = app.user("mia").await;

    let response = app.get("/profile/ghost/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.get("/profile/ghost/unfollow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_pages_require_login() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let response = app.get("/follow/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login/?next=/follow/"));

    let response = app.get("/profile/leo/follow/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some("/auth/login/?next=/profile/leo/follow/")
    );
}

#[tokio::test]
async fn anonymous_profile_has_no_follow_controls() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let profile = body_text(app.get("/profile/leo/", None).await).await;
    assert!(!profile.contains("/profile/leo/follow/"));
    assert!(!profile.contains("Unfollow"));
}
