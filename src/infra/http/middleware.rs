use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{
        Method, Request,
        header::{HOST, ORIGIN},
    },
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use crate::application::{accounts::SESSION_COOKIE, error::ErrorReport};
use crate::presentation::views::{LayoutChrome, render_forbidden_response};

use super::{HttpState, auth::Viewer};

/// Per-request correlation id, present on both the request and the response.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let context = RequestContext {
        request_id: Uuid::new_v4().simple().to_string(),
    };
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    response
}

/// One log line per request. Failures are logged with the [`ErrorReport`]
/// the handler attached, which is taken off the response here.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if response.status().is_success() || response.status().is_redirection() {
        debug!(
            target = "yatube::http::response",
            status,
            method = %method,
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "request served"
        );
        return response;
    }

    let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = chain.first().map_or("no diagnostic available", String::as_str);

    if response.status().is_server_error() {
        error!(
            target = "yatube::http::response",
            status,
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id = %request_id,
            "request failed"
        );
    } else {
        warn!(
            target = "yatube::http::response",
            status,
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            request_id = %request_id,
            "request rejected"
        );
    }

    response
}

/// Resolve the session cookie into a [`Viewer`]. Unknown or expired
/// sessions are treated as anonymous.
pub async fn load_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => Viewer(Some(user)),
            Err(err) => {
                debug!(target = "yatube::http::session", error = %err, "session ignored");
                Viewer::anonymous()
            }
        },
        None => Viewer::anonymous(),
    };
    request.extensions_mut().insert(viewer);
    next.run(request).await
}

/// Refuse form posts sent from another site. Requests without an `Origin`
/// header pass through.
pub async fn verify_origin(request: Request<Body>, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }
    let Some(origin) = request.headers().get(ORIGIN) else {
        return next.run(request).await;
    };

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok());
    let origin = origin.to_str().ok();
    if let (Some(origin), Some(host)) = (origin, host)
        && same_origin(origin, host)
    {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_default();
    render_forbidden_response(
        LayoutChrome::for_viewer(viewer.user()),
        format!(
            "origin `{}` does not match host `{}`",
            origin.unwrap_or("<invalid>"),
            host.unwrap_or("<missing>")
        ),
    )
}

fn same_origin(origin: &str, host: &str) -> bool {
    let Ok(origin) = Url::parse(origin) else {
        return false;
    };
    let Ok(expected) = Url::parse(&format!("{}://{}", origin.scheme(), host)) else {
        return false;
    };
    origin.host_str().is_some()
        && origin.host_str() == expected.host_str()
        && origin.port_or_known_default() == expected.port_or_known_default()
}
