//! HTTP surface: page routes, account routes and the middleware stack.

mod accounts;
mod auth;
mod forms;
mod middleware;
mod public;

pub use auth::{LOGIN_PATH, RequireUser, Viewer, login_redirect_target};
pub use middleware::RequestContext;
pub use public::{HttpState, build_router};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{error::ErrorReport, repos::RepoError};

/// `204` when the store answers, `503` with the cause attached otherwise.
fn health_response(source: &'static str, probe: Result<(), RepoError>) -> Response {
    let Err(err) = probe else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let status = match err {
        RepoError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    let mut response = status.into_response();
    ErrorReport::from_error(source, status, &err).attach(&mut response);
    response
}
