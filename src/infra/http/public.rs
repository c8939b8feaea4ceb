use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State, rejection::FormRejection},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    application::{
        accounts::AccountService,
        comments::{CommentError, CommentOutcome, CommentService},
        error::HttpError,
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        forms::CommentInput,
        pagination::PageNumber,
        posts::{CreateOutcome, EditAccess, EditOutcome, PostError, PostService},
        repos::HealthRepo,
    },
    cache::{CacheState, index_cache_layer},
    domain::posts::preview,
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowTemplate, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        PostDetailTemplate, PostFormTemplate, ProfileTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::{
    accounts,
    auth::{RequireUser, Viewer},
    forms::PostSubmission,
    health_response,
    middleware::{load_viewer, log_responses, set_request_context, verify_origin},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: Option<CacheState>,
    pub upload_body_limit: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global listing is cached; the layer needs the resolved viewer.
    let index_routes = Router::new().route("/", get(index));
    let index_routes = if let Some(cache_state) = state.cache.clone() {
        index_routes.route_layer(middleware::from_fn_with_state(
            cache_state,
            index_cache_layer,
        ))
    } else {
        index_routes
    };

    let page_routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/follow/", get(follow_index))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/create/",
            get(post_create_form)
                .post(post_create)
                .layer(DefaultBodyLimit::max(state.upload_body_limit)),
        )
        .route(
            "/posts/{id}/edit/",
            get(post_edit_form)
                .post(post_edit)
                .layer(DefaultBodyLimit::max(state.upload_body_limit)),
        )
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/media/{*path}", get(serve_upload))
        .route("/_health/db", get(public_health))
        .merge(accounts::routes())
        .fallback(fallback);

    index_routes
        .merge(page_routes)
        .layer(middleware::from_fn(verify_origin))
        .layer(middleware::from_fn_with_state(state.clone(), load_viewer))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user()).with_title("Latest updates");
    match state.feed.index(query.number()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());
    match state.feed.group(&slug, query.number()).await {
        Ok(content) => {
            let title = format!("{} posts", content.group.title);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());
    match state
        .feed
        .profile(&username, viewer.user(), query.number())
        .await
    {
        Ok(content) => {
            let title = format!("Profile of {}", content.author.display_name);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Following");
    match state.feed.follow_index(user.id, query.number()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(err, LayoutChrome::for_viewer(Some(&user))),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(err, LayoutChrome::for_viewer(Some(&user))),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(viewer.user());
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };
    match state.feed.post_detail(id, viewer.user()).await {
        Ok(content) => {
            let title = format!("Post {}", preview(&content.post.text));
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn post_create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("New post");
    match state.posts.blank_form().await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_create(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PostSubmission(input): PostSubmission,
) -> Response {
    match state.posts.create(&user, &input).await {
        Ok(CreateOutcome::Created(post)) => {
            Redirect::to(&profile_path(&post.author_username)).into_response()
        }
        Ok(CreateOutcome::Rejected(content)) => {
            let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("New post");
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Edit post");
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };
    match state.posts.edit_access(id, &user).await {
        Ok(EditAccess::Author(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Ok(EditAccess::NotAuthor) => Redirect::to(&post_path(id)).into_response(),
        Err(err) => post_error_to_response(err, chrome),
    }
}

async fn post_edit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    PostSubmission(input): PostSubmission,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user)).with_title("Edit post");
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };
    match state.posts.edit(id, &user, &input).await {
        Ok(EditOutcome::Updated(post)) => Redirect::to(&post_path(post.id)).into_response(),
        Ok(EditOutcome::NotAuthor) => Redirect::to(&post_path(id)).into_response(),
        Ok(EditOutcome::Rejected(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => post_error_to_response(err, chrome),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    form: Result<Form<CommentInput>, FormRejection>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(chrome);
    };
    // An unreadable body is an empty comment: nothing stored, same redirect.
    let input = match form {
        Ok(Form(input)) => input,
        Err(rejection) => {
            debug!(
                target = "yatube::comments",
                post_id = id,
                reason = %rejection.body_text(),
                "comment body unreadable"
            );
            CommentInput::default()
        }
    };
    match state.comments.add_comment(id, &user, &input).await {
        Ok(CommentOutcome::Created(_) | CommentOutcome::Rejected(_)) => {
            Redirect::to(&post_path(id)).into_response()
        }
        Err(err @ CommentError::UnknownPost(_)) => {
            not_found_with(chrome, HttpError::from(err))
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn fallback(viewer: Viewer) -> Response {
    render_not_found_response(LayoutChrome::for_viewer(viewer.user()))
}

async fn serve_upload(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    health_response("infra::http::public::db_health", state.health.ping().await)
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    if err.is_not_found() {
        not_found_with(chrome, HttpError::from(err))
    } else {
        HttpError::from(err).into_response()
    }
}

fn follow_error_to_response(err: FollowError, chrome: LayoutChrome) -> Response {
    match err {
        FollowError::UnknownAuthor(_) => not_found_with(chrome, HttpError::from(err)),
        err => HttpError::from(err).into_response(),
    }
}

fn post_error_to_response(err: PostError, chrome: LayoutChrome) -> Response {
    match err {
        PostError::UnknownPost(_) => not_found_with(chrome, HttpError::from(err)),
        err => HttpError::from(err).into_response(),
    }
}

/// Render the 404 page while keeping the diagnostic of `err`.
fn not_found_with(chrome: LayoutChrome, err: HttpError) -> Response {
    let mut response = render_not_found_response(chrome);
    err.into_report().attach(&mut response);
    response
}

/// Post ids are numeric; anything else is simply not found.
fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

fn post_path(id: i64) -> String {
    format!("/posts/{id}/")
}
