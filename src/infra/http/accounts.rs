//! Signup, login, logout and password change pages.

use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;

use crate::{
    application::{
        accounts::{LoginOutcome, PasswordChangeOutcome, SESSION_COOKIE, SignupOutcome},
        error::HttpError,
        forms::{LoginInput, PasswordChangeInput, SignupInput},
    },
    presentation::views::{
        LayoutChrome, LayoutContext, LoggedOutTemplate, LoginFormView, LoginTemplate,
        PasswordChangeDoneTemplate, PasswordChangeFormView, PasswordChangeTemplate,
        SignupFormView, SignupTemplate, render_template_response,
    },
};

use super::{
    HttpState,
    auth::{RequireUser, Viewer, safe_next},
};

const PASSWORD_CHANGE_DONE_PATH: &str = "/auth/password_change/done/";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/auth/signup/", get(signup_form).post(signup))
        .route("/auth/login/", get(login_form).post(login))
        .route("/auth/logout/", get(logout).post(logout))
        .route(
            "/auth/password_change/",
            get(password_change_form).post(password_change),
        )
        .route(PASSWORD_CHANGE_DONE_PATH, get(password_change_done))
}

async fn signup_form(viewer: Viewer) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Sign up");
    let view = LayoutContext::new(chrome, SignupFormView::blank());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

async fn signup(
    State(state): State<HttpState>,
    viewer: Viewer,
    Form(input): Form<SignupInput>,
) -> Response {
    match state.accounts.signup(&input).await {
        Ok(SignupOutcome::Registered(_)) => Redirect::to("/").into_response(),
        Ok(SignupOutcome::Rejected(errors)) => {
            let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Sign up");
            let view = LayoutContext::new(chrome, SignupFormView::rejected(&input, errors));
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextQuery {
    next: Option<String>,
}

async fn login_form(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Log in");
    let next = safe_next(query.next.as_deref()).map(str::to_string);
    let view = LayoutContext::new(chrome, LoginFormView::blank(next));
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

async fn login(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(input): Form<LoginInput>,
) -> Response {
    match state.accounts.login(&input).await {
        Ok(LoginOutcome::LoggedIn { token, .. }) => {
            let cookie = Cookie::build((SESSION_COOKIE, token))
                .http_only(true)
                .same_site(SameSite::Lax)
                .path("/")
                .max_age(state.accounts.session_ttl());
            let target = safe_next(input.next.as_deref()).unwrap_or("/");
            (jar.add(cookie), Redirect::to(target)).into_response()
        }
        Ok(LoginOutcome::Rejected(errors)) => {
            let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Log in");
            let view = LayoutContext::new(chrome, LoginFormView::rejected(&input, errors));
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let chrome = LayoutChrome::for_viewer(None).with_title("Logged out");
    let view = LayoutContext::new(chrome, ());
    (
        jar,
        render_template_response(LoggedOutTemplate { view }, StatusCode::OK),
    )
        .into_response()
}

async fn password_change_form(RequireUser(user): RequireUser) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Change password");
    let view = LayoutContext::new(
        chrome,
        PasswordChangeFormView {
            errors: Default::default(),
        },
    );
    render_template_response(PasswordChangeTemplate { view }, StatusCode::OK)
}

async fn password_change(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Form(input): Form<PasswordChangeInput>,
) -> Response {
    match state.accounts.change_password(&user, &input).await {
        Ok(PasswordChangeOutcome::Changed) => {
            Redirect::to(PASSWORD_CHANGE_DONE_PATH).into_response()
        }
        Ok(PasswordChangeOutcome::Rejected(errors)) => {
            let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Change password");
            let view = LayoutContext::new(chrome, PasswordChangeFormView { errors });
            render_template_response(PasswordChangeTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn password_change_done(RequireUser(user): RequireUser) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Password changed");
    let view = LayoutContext::new(chrome, ());
    render_template_response(PasswordChangeDoneTemplate { view }, StatusCode::OK)
}
