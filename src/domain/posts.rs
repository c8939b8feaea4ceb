//! Post and comment text rules.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::error::DomainError;

/// Upper bound on post text, counted in characters rather than bytes.
pub const POST_TEXT_MAX_CHARS: usize = 250;
/// Length of the short preview used in listings and log lines.
pub const PREVIEW_CHARS: usize = 15;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");
pub const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] = format_description!(
    "[day padding:none] [month repr:long] [year] [hour]:[minute]"
);

/// Validate post text and return it trimmed.
pub fn validate_post_text(raw: &str) -> Result<String, DomainError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("text", "This field is required."));
    }
    let length = text.chars().count();
    if length > POST_TEXT_MAX_CHARS {
        return Err(DomainError::validation(
            "text",
            format!(
                "Ensure this value has at most {POST_TEXT_MAX_CHARS} characters (it has {length})."
            ),
        ));
    }
    Ok(text.to_string())
}

pub fn validate_comment_text(raw: &str) -> Result<String, DomainError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("text", "This field is required."));
    }
    Ok(text.to_string())
}

/// First [`PREVIEW_CHARS`] characters of the text.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

pub fn format_human_date(value: OffsetDateTime) -> String {
    value
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

pub fn format_human_datetime(value: OffsetDateTime) -> String {
    value
        .format(HUMAN_DATETIME_FORMAT)
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn text_at_limit_is_accepted() {
        let text = "я".repeat(POST_TEXT_MAX_CHARS);
        assert_eq!(validate_post_text(&text).expect("valid"), text);
    }

    #[test]
    fn text_over_limit_is_rejected() {
        let text = "a".repeat(POST_TEXT_MAX_CHARS + 1);
        let err = validate_post_text(&text).expect_err("too long");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[test]
    fn blank_text_is_required() {
        assert!(validate_post_text("   \n").is_err());
        assert!(validate_comment_text("").is_err());
    }

    #[test]
    fn preview_counts_characters() {
        assert_eq!(preview("Тестовый текст для превью"), "Тестовый текст ");
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn human_date_uses_long_month() {
        let value = datetime!(2024-03-05 10:30 UTC);
        assert_eq!(format_human_date(value), "5 March 2024");
        assert_eq!(format_human_datetime(value), "5 March 2024 10:30");
    }
}
