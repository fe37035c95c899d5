use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserId;

pub const POST_CONTENT_MAX: usize = 799;
pub const COMMENT_CONTENT_MAX: usize = 499;
pub const BIO_MAX: usize = 149;
pub const OCCUPATION_MAX: usize = 30;

/// A single rejected field, reported back to the caller as `{ field, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

fn bounded(
    field: &str,
    value: &str,
    max: usize,
    required: &str,
    too_long: &str,
) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len == 0 {
        Err(FieldError::new(field, required))
    } else if len > max {
        Err(FieldError::new(field, too_long))
    } else {
        Ok(())
    }
}

/// Text of a post. Always between 1 and 799 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostContent(String);

impl PostContent {
    pub fn parse(value: impl Into<String>) -> Result<Self, FieldError> {
        let value = value.into();
        bounded(
            "content",
            &value,
            POST_CONTENT_MAX,
            "Content is required",
            "Content must not exceed 799 characters",
        )?;
        Ok(PostContent(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostContent {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostContent::parse(value)
    }
}

impl From<PostContent> for String {
    fn from(value: PostContent) -> Self {
        value.0
    }
}

impl fmt::Display for PostContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text of a comment. Always between 1 and 499 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommentContent(String);

impl CommentContent {
    pub fn parse(value: impl Into<String>) -> Result<Self, FieldError> {
        let value = value.into();
        bounded(
            "content",
            &value,
            COMMENT_CONTENT_MAX,
            "Comment is required",
            "Comment must not exceed 499 characters",
        )?;
        Ok(CommentContent(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommentContent {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CommentContent::parse(value)
    }
}

impl From<CommentContent> for String {
    fn from(value: CommentContent) -> Self {
        value.0
    }
}

pub fn user_id(value: Option<&str>) -> Result<UserId, FieldError> {
    value
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(UserId)
        .ok_or_else(|| FieldError::new("userId", "Invalid userId"))
}

/// Missing bio means "clear it".
pub fn bio(value: Option<String>) -> Result<String, FieldError> {
    let value = value.unwrap_or_default();
    if value.chars().count() > BIO_MAX {
        return Err(FieldError::new("bio", "Bio must not exceed 149 characters"));
    }
    Ok(value)
}

pub fn occupation(value: Option<String>) -> Result<String, FieldError> {
    let value = value.unwrap_or_default();
    bounded(
        "occupation",
        &value,
        OCCUPATION_MAX,
        "Occupation is required",
        "Occupation must not exceed 30 characters",
    )?;
    Ok(value)
}

/// Runs every check and keeps all failures, so callers can report them together.
pub(crate) fn collect<A, B>(
    a: Result<A, FieldError>,
    b: Result<B, FieldError>,
) -> Result<(A, B), Vec<FieldError>> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (a, b) => Err(a.err().into_iter().chain(b.err()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_content_bounds() {
        assert!(PostContent::parse("a").is_ok());
        assert!(PostContent::parse("a".repeat(799)).is_ok());

        let empty = PostContent::parse("").unwrap_err();
        assert_eq!(empty.message, "Content is required");

        let long = PostContent::parse("a".repeat(800)).unwrap_err();
        assert_eq!(long.field, "content");
        assert_eq!(long.message, "Content must not exceed 799 characters");
    }

    #[test]
    fn content_counts_characters_not_bytes() {
        let accented = "é".repeat(799);
        assert!(accented.len() > 799);
        assert!(PostContent::parse(accented).is_ok());
    }

    #[test]
    fn comment_content_bounds() {
        assert!(CommentContent::parse("b".repeat(499)).is_ok());
        assert_eq!(
            CommentContent::parse("b".repeat(500)).unwrap_err().message,
            "Comment must not exceed 499 characters"
        );
    }

    #[test]
    fn post_content_rejects_bad_json() {
        let parsed: Result<PostContent, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        let parsed: PostContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(parsed.as_str(), "hello");
    }

    #[test]
    fn user_id_must_be_uuid() {
        assert!(user_id(Some("not-a-uuid")).is_err());
        assert!(user_id(None).is_err());
        let id = Uuid::new_v4();
        assert_eq!(user_id(Some(&id.to_string())).unwrap(), UserId(id));
    }

    #[test]
    fn profile_fields() {
        assert_eq!(bio(None).unwrap(), "");
        assert!(bio(Some("x".repeat(150))).is_err());
        assert!(occupation(Some(String::new())).is_err());
        assert!(occupation(Some("x".repeat(31))).is_err());
        assert_eq!(occupation(Some("Engineer".into())).unwrap(), "Engineer");
    }

    #[test]
    fn collect_keeps_every_failure() {
        let errors = collect(user_id(Some("nope")), PostContent::parse("")).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "userId");
        assert_eq!(errors[1].field, "content");
    }
}
