mod common;

use axum::http::{StatusCode, header::SET_COOKIE};
use common::{PASSWORD, TestApp, body_text, location, session_cookie};
use time::Duration;

#[tokio::test]
async fn signup_creates_the_user_and_redirects_home() {
    let app = TestApp::new();

    let form = app.get("/auth/signup/", None).await;
    assert_eq!(form.status(), StatusCode::OK);

    let body = "first_name=Leo&last_name=Tolstoy&username=leo&email=leo%40example.com\
                &password1=War-and-peace-1869&password2=War-and-peace-1869";
    let response = app.post_form("/auth/signup/", body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));

    let user = app.store.user("leo").expect("registered");
    assert_eq!(user.display_name(), "Leo Tolstoy");
    assert_ne!(user.password_hash, "War-and-peace-1869");

    let profile = body_text(app.get("/profile/leo/", None).await).await;
    assert!(profile.contains("All posts by Leo Tolstoy"));
}

#[tokio::test]
async fn signup_rejects_taken_usernames_and_mismatched_passwords() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let body = "username=leo&email=leo%40example.com&password1=Abcdef-12345&password2=Abcdef-12345";
    let response = app.post_form("/auth/signup/", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains("A user with that username already exists.")
    );

    let body = "username=mia&email=mia%40example.com&password1=Abcdef-12345&password2=Other-12345";
    let response = app.post_form("/auth/signup/", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.user("mia").is_none());
}

#[tokio::test]
async fn login_sets_a_session_cookie_and_honours_next() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let body = format!("username=leo&password={PASSWORD}&next=/create/");
    let response = app.post_form("/auth/login/", &body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/create/"));

    let raw_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(raw_cookie.starts_with("sessionid=ses_"));
    assert!(raw_cookie.contains("HttpOnly"));
    assert!(raw_cookie.contains("SameSite=Lax"));

    let cookie = session_cookie(&response).expect("cookie");
    let index = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(index.contains("Signed in as"));
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let body = format!("username=leo&password={PASSWORD}&next=//evil.example/");
    let response = app.post_form("/auth/login/", &body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn wrong_password_shows_the_form_again() {
    let app = TestApp::new();
    app.store.add_user("leo");

    let response = app
        .post_form("/auth/login/", "username=leo&password=nope", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert!(
        body_text(response)
            .await
            .contains("Please enter a correct username and password")
    );
}

#[tokio::test]
async fn login_form_carries_next_through() {
    let app = TestApp::new();
    let body = body_text(app.get("/auth/login/?next=/follow/", None).await).await;
    assert!(body.contains("value=\"/follow/\""));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let (_, cookie) = app.user("leo").await;

    let response = app.get("/auth/logout/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let removal = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("cookie removal")
        .to_string();
    assert!(removal.starts_with("sessionid="));
    assert!(body_text(response).await.contains("logged out"));

    // The old cookie no longer identifies anyone.
    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn expired_sessions_are_anonymous() {
    let app = TestApp::new();
    let (_, cookie) = app.user("leo").await;

    app.clock.advance(Duration::days(15));
    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login/?next=/create/"));
}

#[tokio::test]
async fn garbage_cookie_is_ignored() {
    let app = TestApp::new();
    let response = app.get("/", Some("sessionid=not-a-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn password_change_requires_login() {
    let app = TestApp::new();
    let response = app.get("/auth/password_change/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some("/auth/login/?next=/auth/password_change/")
    );
}

#[tokio::test]
async fn password_change_replaces_the_hash() {
    let app = TestApp::new();
    let (user, cookie) = app.user("leo").await;

    let response = app
        .post_form(
            "/auth/password_change/",
            "old_password=wrong&new_password1=Brand-new-pass-1&new_password2=Brand-new-pass-1",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains("Your old password was entered incorrectly")
    );

    let body = format!(
        "old_password={PASSWORD}&new_password1=Brand-new-pass-1&new_password2=Brand-new-pass-1"
    );
    let response = app
        .post_form("/auth/password_change/", &body, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/password_change/done/"));

    let updated = app.store.user("leo").expect("user");
    assert_ne!(updated.password_hash, user.password_hash);

    let done = app.get("/auth/password_change/done/", Some(&cookie)).await;
    assert_eq!(done.status(), StatusCode::OK);
}
