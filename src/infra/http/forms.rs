//! Post form submissions, accepted as multipart (with an optional image)
//! or as a plain urlencoded body.

use axum::{
    Form,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::error;

use crate::application::{
    error::HttpError,
    forms::{ImageUpload, PostInput},
};

const SOURCE: &str = "infra::http::forms";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPostForm {
    text: String,
    group: String,
    #[serde(rename = "image-clear")]
    image_clear: Option<String>,
}

impl From<RawPostForm> for PostInput {
    fn from(raw: RawPostForm) -> Self {
        Self {
            text: raw.text,
            group: raw.group,
            image: None,
            image_clear: raw.image_clear.as_deref().is_some_and(is_checked),
        }
    }
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

pub struct PostSubmission(pub PostInput);

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            read_post_input(&mut multipart)
                .await
                .map(Self)
                .map_err(IntoResponse::into_response)
        } else {
            let Form(raw) = Form::<RawPostForm>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(raw.into()))
        }
    }
}

async fn read_post_input(multipart: &mut Multipart) -> Result<PostInput, HttpError> {
    let mut input = PostInput::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "Upload is too large"
                } else {
                    "Invalid form data"
                };
                return Err(HttpError::new(SOURCE, status, public_message, err.to_string()));
            }
        };

        match field.name() {
            Some("text") => input.text = read_text(field).await?,
            Some("group") => input.group = read_text(field).await?,
            Some("image-clear") => input.image_clear = is_checked(&read_text(field).await?),
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.to_string())
                    .filter(|value| !value.trim().is_empty());
                let content_type = field.content_type().map(|mime| mime.to_string());
                let bytes = field.bytes().await.map_err(|err| {
                    HttpError::new(SOURCE, err.status(), "Invalid form data", err.to_string())
                })?;
                // Browsers send an empty part when no file was chosen.
                if let Some(filename) = filename
                    && !bytes.is_empty()
                {
                    input.image = Some(ImageUpload {
                        filename,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => continue,
        }
    }
    Ok(input)
}

async fn read_text(field: axum_extra::extract::multipart::Field) -> Result<String, HttpError> {
    field
        .text()
        .await
        .map_err(|err| HttpError::new(SOURCE, err.status(), "Invalid form data", err.to_string()))
}
