use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{CommentContent, FieldError, PostContent};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub(crate) fn generate() -> Self {
        PostId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub(crate) fn generate() -> Self {
        CommentId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity handed to us by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub bio: String,
    pub occupation: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        User {
            id: UserId(Uuid::new_v4()),
            name: name.into(),
            email: None,
            image: None,
            bio: String::new(),
            occupation: None,
            is_verified: false,
            created_at: Utc::now(),
        }
    }

    pub fn author(&self) -> Author {
        Author {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
            is_verified: self.is_verified,
        }
    }
}

/// Public view of a user, embedded in posts, comments and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub image: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

impl Author {
    /// `@handle` shown under the display name: lowercase, no whitespace.
    pub fn handle(&self) -> String {
        let mut handle = String::from("@");
        handle.extend(
            self.name
                .split_whitespace()
                .flat_map(|part| part.chars().flat_map(char::to_lowercase)),
        );
        handle
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub content: PostContent,
    pub created_at: DateTime<Utc>,
    pub user: Author,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub content: CommentContent,
    pub created_at: DateTime<Utc>,
    pub user: Author,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: UserId,
    pub content: PostContent,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub author: UserId,
    pub content: CommentContent,
}

/// 1-indexed page of the global feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Page { number, size }
    }

    pub fn skip(&self) -> usize {
        self.number.saturating_sub(1) as usize * self.size as usize
    }

    pub fn limit(&self) -> usize {
        self.size as usize
    }

    /// `skip + returned < total`
    pub fn has_more(&self, returned: usize, total: usize) -> bool {
        self.skip() + returned < total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: PostId,
    pub content: PostContent,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        PostSummary {
            id: post.id,
            content: post.content,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub image: Option<String>,
    pub email: Option<String>,
    pub bio: String,
    pub occupation: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<PostSummary>,
}

impl UserProfile {
    pub fn new(user: User, posts: Vec<PostSummary>) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
            image: user.image,
            email: user.email,
            bio: user.bio,
            occupation: user.occupation,
            is_verified: user.is_verified,
            created_at: user.created_at,
            posts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub reason: String,
    pub proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVerificationRequest {
    pub fullname: String,
    pub email: String,
    pub reason: String,
    pub proof: Option<String>,
}

impl NewVerificationRequest {
    pub fn new(
        fullname: Option<String>,
        email: Option<String>,
        reason: Option<String>,
        proof: Option<String>,
    ) -> Result<Self, FieldError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (present(fullname), present(email), present(reason)) {
            (Some(fullname), Some(email), Some(reason)) => Ok(NewVerificationRequest {
                fullname,
                email,
                reason,
                proof: present(proof),
            }),
            _ => Err(FieldError::new("request", "All fields are required.")),
        }
    }
}

/// Body of `POST /api/create`. Fields are optional so missing ones are reported
/// as validation errors instead of decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub user_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostBody {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentBody {
    pub post_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBioBody {
    pub user_id: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOccupationBody {
    pub user_id: Option<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationBody {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub reason: Option<String>,
    pub proof: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub users: Vec<Author>,
}

/// `message` is either a sentence or the list of rejected fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Text(String),
    Fields(Vec<FieldError>),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => f.write_str(text),
            Message::Fields(fields) => {
                let mut first = true;
                for field in fields {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    write!(f, "{}", field.message)?;
                }
                Ok(())
            }
        }
    }
}

/// The `{ success, message }` envelope used by every mutation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: Message,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Outcome {
            success: true,
            message: Message::Text(message.into()),
        }
    }

    pub fn failure(message: Message) -> Self {
        Outcome {
            success: false,
            message,
        }
    }
}

/// [`Outcome`] plus a record, e.g. `{ success, message, post }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeWith<T> {
    pub success: bool,
    pub message: Message,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> OutcomeWith<T> {
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        OutcomeWith {
            success: true,
            message: Message::Text(message.into()),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPayload {
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_math() {
        let third = Page::new(3, 5);
        assert_eq!(third.skip(), 10);
        assert!(!third.has_more(2, 12));
        assert!(Page::new(2, 5).has_more(5, 12));
        assert_eq!(Page::new(0, 5).skip(), 0);
    }

    #[test]
    fn handle_strips_whitespace() {
        let author = User::new("Ada  Love Lace").author();
        assert_eq!(author.handle(), "@adalovelace");
    }

    #[test]
    fn post_serializes_camel_case() {
        let user = User::new("Ada");
        let post = Post {
            id: PostId("p1".into()),
            content: PostContent::parse("hi").unwrap(),
            created_at: Utc::now(),
            user: user.author(),
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["id"], "p1");
        assert_eq!(value["content"], "hi");
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["user"]["isVerified"], false);
        assert_eq!(value["user"]["image"], serde_json::Value::Null);
    }

    #[test]
    fn outcome_flattens_payload() {
        let user = User::new("Ada");
        let value = serde_json::to_value(OutcomeWith::ok("done", UserPayload { user })).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "done");
        assert_eq!(value["user"]["name"], "Ada");

        let value = serde_json::to_value(Outcome::ok("fine")).unwrap();
        assert_eq!(value, json!({ "success": true, "message": "fine" }));
    }

    #[test]
    fn failure_message_lists_fields() {
        let outcome = Outcome::failure(Message::Fields(vec![FieldError::new(
            "content",
            "Content must not exceed 799 characters",
        )]));
        let value = serde_json::to_value(outcome).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["message"][0]["field"], "content");
    }

    #[test]
    fn verification_requires_fields() {
        let missing_email =
            NewVerificationRequest::new(Some("A".into()), None, Some("r".into()), None);
        assert!(missing_email.is_err());
        let request = NewVerificationRequest::new(
            Some("Ada".into()),
            Some("ada@example.com".into()),
            Some("notable".into()),
            Some("  ".into()),
        )
        .unwrap();
        assert_eq!(request.proof, None);
    }
}
