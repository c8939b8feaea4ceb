//! Request identity.
//!
//! [`super::middleware::load_viewer`] resolves the session cookie once per
//! request and stores a [`Viewer`] in the request extensions. Handlers read
//! it back through the [`Viewer`] extractor, or demand a signed-in user with
//! [`RequireUser`], which turns anonymous requests into a login redirect.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

use crate::domain::entities::UserRecord;

pub const LOGIN_PATH: &str = "/auth/login/";

/// The identity behind the current request, anonymous when `None`.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// A signed-in user. Anonymous requests are redirected to the login page
/// with the original path and query as `next`.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserRecord);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>().and_then(|viewer| viewer.0.clone()) {
            Some(user) => Ok(Self(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or_else(|| parts.uri.path());
                Err(Redirect::to(&login_redirect_target(next)).into_response())
            }
        }
    }
}

/// `/auth/login/?next=<target>` with slashes in the target left readable.
pub fn login_redirect_target(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))
}

/// Accept a post-login destination only when it stays on this site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|value| {
        value.starts_with('/') && !value.starts_with("//") && !value.contains('\\')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_target_keeps_slashes() {
        assert_eq!(
            login_redirect_target("/posts/3/comment/"),
            "/auth/login/?next=/posts/3/comment/"
        );
        assert_eq!(
            login_redirect_target("/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(Some("/create/")), Some("/create/"));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }
}
