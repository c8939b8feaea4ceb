//! Submitted form payloads and field-level error collection.

use std::collections::BTreeMap;

use bytes::Bytes;
use imagesize::ImageError;
use serde::Deserialize;

use crate::domain::error::DomainError;

/// Field name used for errors that do not belong to a single input.
pub const NON_FIELD: &str = "__all__";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    /// Record a domain validation failure under its field. Other domain
    /// errors land in the non-field bucket.
    pub fn add_domain(&mut self, error: DomainError) {
        match error {
            DomainError::Validation { field, message } => self.add(field, message),
            other => self.add(NON_FIELD, other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        self.field(NON_FIELD)
    }

    pub fn has(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {message}")?;
            }
        }
        Ok(())
    }
}

/// Raw image part of a multipart submission.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// The payload must decode as an image, whatever its name claims.
    pub fn validate(&self) -> Result<(), DomainError> {
        match imagesize::blob_size(&self.bytes) {
            Ok(size) if size.width > 0 && size.height > 0 => Ok(()),
            Err(ImageError::IoError(err)) => Err(DomainError::validation(
                "image",
                format!("The uploaded image could not be read: {err}"),
            )),
            _ => Err(DomainError::validation(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            )),
        }
    }
}

/// Post create/edit submission.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    /// Raw group id; empty means "no group".
    pub group: String,
    pub image: Option<ImageUpload>,
    pub image_clear: bool,
}

impl PostInput {
    /// Parse the group selector. `Ok(None)` for an empty choice.
    pub fn group_id(&self) -> Result<Option<i64>, DomainError> {
        let raw = self.group.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<i64>().map(Some).map_err(|_| {
            DomainError::validation(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            )
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentInput {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeInput {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn upload(bytes: &'static [u8]) -> ImageUpload {
        ImageUpload {
            filename: "small.gif".to_string(),
            content_type: Some("image/gif".to_string()),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn gif_payload_is_an_image() {
        assert!(upload(SMALL_GIF).validate().is_ok());
    }

    #[test]
    fn text_payload_is_rejected_as_image() {
        let err = upload(b"definitely not an image").validate().expect_err("rejected");
        assert!(matches!(err, DomainError::Validation { field: "image", .. }));
    }

    #[test]
    fn group_id_parsing() {
        let mut input = PostInput::default();
        assert_eq!(input.group_id().expect("empty"), None);
        input.group = "7".to_string();
        assert_eq!(input.group_id().expect("number"), Some(7));
        input.group = "seven".to_string();
        assert!(input.group_id().is_err());
    }

    #[test]
    fn errors_group_by_field() {
        let mut errors = FormErrors::new();
        assert!(errors.clone().into_result().is_ok());
        errors.add_domain(DomainError::validation("text", "too long"));
        errors.add(NON_FIELD, "bad credentials");
        assert_eq!(errors.field("text"), ["too long".to_string()]);
        assert_eq!(errors.non_field().len(), 1);
        assert!(errors.field("group").is_empty());
        assert_eq!(errors.to_string(), "__all__: bad credentials; text: too long");
    }
}
