use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::share_link;
use crate::models::{
    Author, Comment, CommentId, CreateCommentBody, CreatePostBody, FeedPage, Message, Outcome,
    OutcomeWith, Post, PostId, PostPayload, SearchResult, Session, UpdateBioBody,
    UpdateOccupationBody, UpdatePostBody, User, UserId, UserPayload, UserProfile,
    VerificationBody, VerificationRequest,
};
use crate::paginator::{FeedPaginator, FetchOutcome, PageFetcher};
use crate::server::SESSION_HEADER;
use crate::validation::{self, CommentContent, FieldError, PostContent};

pub const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

/// Everything that can go wrong talking to the API. Kept `Clone` so the feed
/// can hold on to the last failure as its error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid input: {0:?}")]
    Invalid(Vec<FieldError>),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Text fit for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Invalid(fields) => Message::Fields(fields.clone()).to_string(),
            ClientError::Rejected { status, message } if (400..500).contains(status) => {
                message.clone()
            }
            _ => GENERIC_FAILURE.to_owned(),
        }
    }
}

impl From<FieldError> for ClientError {
    fn from(value: FieldError) -> Self {
        ClientError::Invalid(vec![value])
    }
}

/// HTTP client for the Discuze API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// - base_url: Where the API is served
    ///   Ex: http://0.0.0.0:3030
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        ApiClient { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn share_link(&self, id: &PostId) -> String {
        share_link(&self.base_url, id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_json<T: Serialize>(
        request: RequestBuilder,
        body: &T,
    ) -> Result<RequestBuilder, ClientError> {
        let body = serde_json::to_string(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(request.header(CONTENT_TYPE, "application/json").body(body))
    }

    fn authorized(request: RequestBuilder, session: &Session) -> RequestBuilder {
        request.header(SESSION_HEADER, session.user_id.to_string())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            debug!("Request failed with {status}: {body}");
            return Err(match serde_json::from_str::<Outcome>(&body) {
                Ok(Outcome {
                    message: Message::Fields(fields),
                    ..
                }) => ClientError::Invalid(fields),
                Ok(outcome) => ClientError::Rejected {
                    status: status.as_u16(),
                    message: outcome.message.to_string(),
                },
                Err(_) => ClientError::Rejected {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn list_posts(&self, page: u32) -> Result<FeedPage, ClientError> {
        let request = self
            .http
            .get(self.url("/api/allposts"))
            .query(&[("page", page)]);
        self.send(request).await
    }

    pub async fn get_post(&self, id: &PostId) -> Result<Post, ClientError> {
        let request = self.http.get(self.url(&format!("/api/allposts/{id}")));
        self.send(request).await
    }

    pub async fn comments(&self, id: &PostId) -> Result<Vec<Comment>, ClientError> {
        let request = self
            .http
            .get(self.url(&format!("/api/allposts/{id}/comments")));
        self.send(request).await
    }

    /// Validates locally first; nothing is sent for out-of-bounds content.
    pub async fn create_post(&self, session: &Session, content: &str) -> Result<(), ClientError> {
        PostContent::parse(content)?;
        let body = CreatePostBody {
            user_id: Some(session.user_id.to_string()),
            content: Some(content.to_owned()),
        };
        let request = Self::authorized(self.http.post(self.url("/api/create")), session);
        self.send::<Outcome>(Self::with_json(request, &body)?)
            .await
            .map(|_| ())
    }

    pub async fn update_post(
        &self,
        session: &Session,
        id: &PostId,
        content: &str,
    ) -> Result<Post, ClientError> {
        PostContent::parse(content)?;
        let body = UpdatePostBody {
            content: Some(content.to_owned()),
        };
        let request = Self::authorized(
            self.http.put(self.url(&format!("/api/update/{id}"))),
            session,
        );
        let outcome: OutcomeWith<PostPayload> =
            self.send(Self::with_json(request, &body)?).await?;
        Ok(outcome.payload.post)
    }

    pub async fn delete_post(&self, session: &Session, id: &PostId) -> Result<(), ClientError> {
        let request = Self::authorized(
            self.http.delete(self.url(&format!("/api/delete/{id}"))),
            session,
        );
        self.send::<Outcome>(request).await.map(|_| ())
    }

    pub async fn add_comment(
        &self,
        session: &Session,
        post: &PostId,
        content: &str,
    ) -> Result<(), ClientError> {
        CommentContent::parse(content)?;
        let body = CreateCommentBody {
            post_id: Some(post.0.clone()),
            content: Some(content.to_owned()),
        };
        let request = Self::authorized(self.http.post(self.url("/api/comments")), session);
        self.send::<Outcome>(Self::with_json(request, &body)?)
            .await
            .map(|_| ())
    }

    pub async fn delete_comment(
        &self,
        session: &Session,
        id: &CommentId,
    ) -> Result<(), ClientError> {
        let request = Self::authorized(
            self.http.delete(self.url(&format!("/api/comments/{id}"))),
            session,
        );
        self.send::<Outcome>(request).await.map(|_| ())
    }

    pub async fn user_posts(&self, id: UserId) -> Result<Vec<Post>, ClientError> {
        let request = self.http.get(self.url(&format!("/api/userposts/{id}")));
        self.send(request).await
    }

    /// An empty bio clears it.
    pub async fn update_bio(&self, session: &Session, bio: &str) -> Result<User, ClientError> {
        validation::bio(Some(bio.to_owned()))?;
        let body = UpdateBioBody {
            user_id: Some(session.user_id.to_string()),
            bio: Some(bio.to_owned()),
        };
        let request = Self::authorized(self.http.put(self.url("/api/updatebio")), session);
        let outcome: OutcomeWith<UserPayload> =
            self.send(Self::with_json(request, &body)?).await?;
        Ok(outcome.payload.user)
    }

    pub async fn update_occupation(
        &self,
        session: &Session,
        occupation: &str,
    ) -> Result<User, ClientError> {
        validation::occupation(Some(occupation.to_owned()))?;
        let body = UpdateOccupationBody {
            user_id: Some(session.user_id.to_string()),
            occupation: Some(occupation.to_owned()),
        };
        let request = Self::authorized(self.http.put(self.url("/api/updateoccupation")), session);
        let outcome: OutcomeWith<UserPayload> =
            self.send(Self::with_json(request, &body)?).await?;
        Ok(outcome.payload.user)
    }

    pub async fn get_verified(
        &self,
        body: &VerificationBody,
    ) -> Result<VerificationRequest, ClientError> {
        let request = self.http.post(self.url("/api/getverified"));
        self.send(Self::with_json(request, body)?).await
    }

    /// Blank queries return nothing without a round-trip.
    pub async fn search_users(&self, query: &str) -> Result<Vec<Author>, ClientError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .get(self.url("/api/searchusers"))
            .query(&[("query", query)]);
        let result: SearchResult = self.send(request).await?;
        Ok(result.users)
    }

    pub async fn user_profile(&self, id: UserId) -> Result<UserProfile, ClientError> {
        let request = self.http.get(self.url(&format!("/api/userprofile/{id}")));
        self.send(request).await
    }
}

impl PageFetcher for ApiClient {
    async fn fetch_page(&self, page: u32) -> Result<FeedPage, ClientError> {
        self.list_posts(page).await
    }
}

impl FeedPaginator<ApiClient> {
    /// Creates a post, then reloads the feed from page 1 so it shows up first.
    /// A rejected post leaves the feed untouched.
    pub async fn publish(
        &mut self,
        session: &Session,
        content: &str,
    ) -> Result<FetchOutcome, ClientError> {
        self.fetcher().create_post(session, content).await?;
        self.reset_after_mutation().await
    }

    /// Saves an edit and patches the loaded copy in place.
    pub async fn edit(
        &mut self,
        session: &Session,
        id: &PostId,
        content: &str,
    ) -> Result<bool, ClientError> {
        let post = self.fetcher().update_post(session, id, content).await?;
        Ok(self.apply_local_edit(&post.id, post.content))
    }

    pub async fn delete(&mut self, session: &Session, id: &PostId) -> Result<bool, ClientError> {
        self.fetcher().delete_post(session, id).await?;
        Ok(self.apply_local_delete(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // Nothing listens on the discard port; any request that escapes fails.
    fn offline() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9/")
    }

    fn session() -> Session {
        Session {
            user_id: UserId(Uuid::new_v4()),
        }
    }

    #[test]
    fn trims_base_url() {
        let client = offline();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert_eq!(
            client.share_link(&PostId("p1".into())),
            "http://127.0.0.1:9/allposts/p1"
        );
    }

    #[tokio::test]
    async fn oversized_post_is_rejected_before_sending() {
        let error = offline()
            .create_post(&session(), &"x".repeat(800))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            ClientError::Invalid(vec![FieldError::new(
                "content",
                "Content must not exceed 799 characters"
            )])
        );
        assert_eq!(error.user_message(), "Content must not exceed 799 characters");
    }

    #[tokio::test]
    async fn empty_comment_is_rejected_before_sending() {
        let error = offline()
            .add_comment(&session(), &PostId("p1".into()), "")
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Invalid(_)));
    }

    #[tokio::test]
    async fn profile_fields_are_checked_before_sending() {
        let client = offline();
        let error = client
            .update_bio(&session(), &"b".repeat(150))
            .await
            .unwrap_err();
        assert_eq!(error.user_message(), "Bio must not exceed 149 characters");

        let error = client.update_occupation(&session(), "").await.unwrap_err();
        assert!(matches!(error, ClientError::Invalid(_)));
    }

    #[tokio::test]
    async fn blank_search_skips_the_network() {
        assert!(offline().search_users("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_get_a_generic_message() {
        let error = offline().list_posts(1).await.unwrap_err();
        assert!(matches!(error, ClientError::Transport(_)));
        assert_eq!(error.user_message(), GENERIC_FAILURE);
    }
}
