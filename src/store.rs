use crate::error::StoreError;
use crate::models::{
    Author, Comment, CommentId, FeedPage, NewComment, NewPost, NewVerificationRequest, Page, Post,
    PostId, User, UserId, UserProfile, VerificationRequest,
};
use crate::validation::PostContent;

/// Persistence behind the HTTP endpoints.
///
/// Reads take `&self`, writes take `&mut self`; the server shares a store as
/// `Arc<Mutex<S>>` so each request gets exclusive access for one call.
pub trait PostStore {
    fn insert_user(
        &mut self,
        user: User,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
    fn get_user(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>, StoreError>> + Send;
    fn search_users(
        &self,
        query: String,
    ) -> impl std::future::Future<Output = Result<Vec<Author>, StoreError>> + Send;
    fn update_bio(
        &mut self,
        id: UserId,
        bio: String,
    ) -> impl std::future::Future<Output = Result<Option<User>, StoreError>> + Send;
    fn update_occupation(
        &mut self,
        id: UserId,
        occupation: String,
    ) -> impl std::future::Future<Output = Result<Option<User>, StoreError>> + Send;
    fn user_profile(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<UserProfile>, StoreError>> + Send;

    /// Posts newest first; `has_more` is `skip + returned < total`.
    fn list_posts(
        &self,
        page: Page,
    ) -> impl std::future::Future<Output = Result<FeedPage, StoreError>> + Send;
    fn get_post(
        &self,
        id: PostId,
    ) -> impl std::future::Future<Output = Result<Option<Post>, StoreError>> + Send;
    fn user_posts(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Post>, StoreError>> + Send;
    fn create_post(
        &mut self,
        post: NewPost,
    ) -> impl std::future::Future<Output = Result<Post, StoreError>> + Send;
    fn update_post(
        &mut self,
        id: PostId,
        content: PostContent,
    ) -> impl std::future::Future<Output = Result<Option<Post>, StoreError>> + Send;
    /// Removes the post along with its comments.
    fn delete_post(
        &mut self,
        id: PostId,
    ) -> impl std::future::Future<Output = Result<Option<Post>, StoreError>> + Send;

    /// Oldest first.
    fn list_comments(
        &self,
        post: PostId,
    ) -> impl std::future::Future<Output = Result<Vec<Comment>, StoreError>> + Send;
    fn get_comment(
        &self,
        id: CommentId,
    ) -> impl std::future::Future<Output = Result<Option<Comment>, StoreError>> + Send;
    fn create_comment(
        &mut self,
        comment: NewComment,
    ) -> impl std::future::Future<Output = Result<Comment, StoreError>> + Send;
    fn delete_comment(
        &mut self,
        id: CommentId,
    ) -> impl std::future::Future<Output = Result<Option<Comment>, StoreError>> + Send;

    fn create_verification_request(
        &mut self,
        request: NewVerificationRequest,
    ) -> impl std::future::Future<Output = Result<VerificationRequest, StoreError>> + Send;
}

/// Behaviour every store must share; run against each implementation.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::models::PostSummary;
    use crate::validation::CommentContent;

    pub(crate) async fn seed_user<S: PostStore>(store: &mut S, name: &str) -> User {
        let user = User::new(name);
        store.insert_user(user.clone()).await.unwrap();
        user
    }

    pub(crate) async fn seed_posts<S: PostStore>(
        store: &mut S,
        author: &User,
        count: usize,
    ) -> Vec<Post> {
        let mut posts = Vec::new();
        for i in 0..count {
            let post = store
                .create_post(NewPost {
                    author: author.id,
                    content: PostContent::parse(format!("post {i}")).unwrap(),
                })
                .await
                .unwrap();
            posts.push(post);
        }
        posts
    }

    pub(crate) async fn pages_walk_newest_first<S: PostStore>(mut store: S) {
        let ada = seed_user(&mut store, "Ada").await;
        seed_posts(&mut store, &ada, 12).await;

        let first = store.list_posts(Page::new(1, 5)).await.unwrap();
        assert_eq!(first.posts.len(), 5);
        assert!(first.has_more);
        assert_eq!(first.posts[0].content.as_str(), "post 11");
        assert_eq!(first.posts[0].user.name, "Ada");

        let third = store.list_posts(Page::new(3, 5)).await.unwrap();
        assert_eq!(third.posts.len(), 2);
        assert!(!third.has_more);
        assert_eq!(third.posts[1].content.as_str(), "post 0");

        let beyond = store.list_posts(Page::new(4, 5)).await.unwrap();
        assert!(beyond.posts.is_empty());
        assert!(!beyond.has_more);
    }

    pub(crate) async fn post_lifecycle<S: PostStore>(mut store: S) {
        let ada = seed_user(&mut store, "Ada").await;
        let post = seed_posts(&mut store, &ada, 1).await.remove(0);

        let fetched = store.get_post(post.id.clone()).await.unwrap().unwrap();
        assert_eq!(fetched, post);

        let edited = store
            .update_post(post.id.clone(), PostContent::parse("edited").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.content.as_str(), "edited");
        assert_eq!(edited.created_at, post.created_at);

        let missing = store
            .update_post(PostId("nope".into()), PostContent::parse("x").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());

        let removed = store.delete_post(post.id.clone()).await.unwrap();
        assert_eq!(removed.map(|p| p.id), Some(post.id.clone()));
        assert!(store.get_post(post.id).await.unwrap().is_none());
    }

    pub(crate) async fn unknown_author_is_rejected<S: PostStore>(mut store: S) {
        let ghost = User::new("Ghost");
        let result = store
            .create_post(NewPost {
                author: ghost.id,
                content: PostContent::parse("boo").unwrap(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::UnknownUser)));
    }

    pub(crate) async fn comments_follow_their_post<S: PostStore>(mut store: S) {
        let ada = seed_user(&mut store, "Ada").await;
        let bob = seed_user(&mut store, "Bob").await;
        let post = seed_posts(&mut store, &ada, 1).await.remove(0);

        for (author, text) in [(&bob, "first"), (&ada, "second")] {
            store
                .create_comment(NewComment {
                    post_id: post.id.clone(),
                    author: author.id,
                    content: CommentContent::parse(text).unwrap(),
                })
                .await
                .unwrap();
        }

        let comments = store.list_comments(post.id.clone()).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(comments[0].user.name, "Bob");

        let fetched = store.get_comment(comments[0].id.clone()).await.unwrap();
        assert_eq!(fetched.as_ref(), Some(&comments[0]));

        let orphan = store
            .create_comment(NewComment {
                post_id: PostId("missing".into()),
                author: bob.id,
                content: CommentContent::parse("hello?").unwrap(),
            })
            .await;
        assert!(matches!(orphan, Err(StoreError::UnknownPost)));

        let removed = store.delete_comment(comments[0].id.clone()).await.unwrap();
        assert!(removed.is_some());
        assert_eq!(store.list_comments(post.id.clone()).await.unwrap().len(), 1);

        store.delete_post(post.id.clone()).await.unwrap();
        assert!(store.get_comment(comments[1].id.clone()).await.unwrap().is_none());
    }

    pub(crate) async fn users_and_profiles<S: PostStore>(mut store: S) {
        let ada = seed_user(&mut store, "Ada Lovelace").await;
        let bob = seed_user(&mut store, "Bob").await;
        seed_posts(&mut store, &ada, 2).await;
        seed_posts(&mut store, &bob, 1).await;

        let found = store.search_users("lOVE".into()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ada.id);

        let updated = store
            .update_bio(ada.id, "Counting engines".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.bio, "Counting engines");

        let updated = store
            .update_occupation(ada.id, "Mathematician".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.occupation.as_deref(), Some("Mathematician"));

        let nobody = User::new("Nobody");
        assert!(store.update_bio(nobody.id, String::new()).await.unwrap().is_none());
        assert!(store.user_profile(nobody.id).await.unwrap().is_none());

        let profile = store.user_profile(ada.id).await.unwrap().unwrap();
        assert_eq!(profile.bio, "Counting engines");
        let contents: Vec<_> = profile
            .posts
            .iter()
            .map(|p: &PostSummary| p.content.as_str())
            .collect();
        assert_eq!(contents, ["post 1", "post 0"]);

        let own = store.user_posts(bob.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user.id, bob.id);
    }

    pub(crate) async fn verification_requests<S: PostStore>(mut store: S) {
        let stored = store
            .create_verification_request(NewVerificationRequest {
                fullname: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                reason: "Public figure".into(),
                proof: None,
            })
            .await
            .unwrap();
        assert_eq!(stored.fullname, "Ada Lovelace");
        assert!(!stored.id.is_empty());
    }
}
