use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Author, Comment, CommentId, FeedPage, NewComment, NewPost, NewVerificationRequest, Page, Post,
    PostId, PostSummary, User, UserId, UserProfile, VerificationRequest,
};
use crate::store::PostStore;
use crate::validation::{CommentContent, PostContent};

#[derive(Debug, Clone)]
struct StoredPost {
    id: PostId,
    author: UserId,
    content: PostContent,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: CommentId,
    post_id: PostId,
    author: UserId,
    content: CommentContent,
    created_at: DateTime<Utc>,
}

/// Keeps everything in vectors. Posts are kept in insertion order and sorted on
/// read, so equal timestamps resolve to the most recently inserted post.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: Vec<User>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    verification_requests: Vec<VerificationRequest>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    fn author(&self, id: UserId) -> Result<Author, StoreError> {
        self.user(id)
            .map(User::author)
            .ok_or(StoreError::UnknownUser)
    }

    fn hydrate_post(&self, post: &StoredPost) -> Result<Post, StoreError> {
        Ok(Post {
            id: post.id.clone(),
            content: post.content.clone(),
            created_at: post.created_at,
            user: self.author(post.author)?,
        })
    }

    fn hydrate_comment(&self, comment: &StoredComment) -> Result<Comment, StoreError> {
        Ok(Comment {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            content: comment.content.clone(),
            created_at: comment.created_at,
            user: self.author(comment.author)?,
        })
    }

    fn newest_first<'a>(&'a self, filter: impl Fn(&StoredPost) -> bool) -> Vec<&'a StoredPost> {
        let mut posts: Vec<_> = self.posts.iter().rev().filter(|p| filter(p)).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

impl PostStore for MemoryStore {
    async fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        match self.users.iter_mut().find(|existing| existing.id == user.id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.user(id).cloned())
    }

    async fn search_users(&self, query: String) -> Result<Vec<Author>, StoreError> {
        let needle = query.to_lowercase();
        Ok(self
            .users
            .iter()
            .filter(|user| user.name.to_lowercase().contains(&needle))
            .map(User::author)
            .collect())
    }

    async fn update_bio(&mut self, id: UserId, bio: String) -> Result<Option<User>, StoreError> {
        Ok(self.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.bio = bio;
            user.clone()
        }))
    }

    async fn update_occupation(
        &mut self,
        id: UserId,
        occupation: String,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.occupation = Some(occupation);
            user.clone()
        }))
    }

    async fn user_profile(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let Some(user) = self.user(id) else {
            return Ok(None);
        };
        let posts = self
            .newest_first(|post| post.author == id)
            .into_iter()
            .map(|post| self.hydrate_post(post).map(PostSummary::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(UserProfile::new(user.clone(), posts)))
    }

    async fn list_posts(&self, page: Page) -> Result<FeedPage, StoreError> {
        let sorted = self.newest_first(|_| true);
        let posts = sorted
            .iter()
            .skip(page.skip())
            .take(page.limit())
            .map(|post| self.hydrate_post(post))
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = page.has_more(posts.len(), sorted.len());
        Ok(FeedPage { posts, has_more })
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        self.posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| self.hydrate_post(post))
            .transpose()
    }

    async fn user_posts(&self, id: UserId) -> Result<Vec<Post>, StoreError> {
        self.newest_first(|post| post.author == id)
            .into_iter()
            .map(|post| self.hydrate_post(post))
            .collect()
    }

    async fn create_post(&mut self, post: NewPost) -> Result<Post, StoreError> {
        let user = self.author(post.author)?;
        let stored = StoredPost {
            id: PostId::generate(),
            author: post.author,
            content: post.content,
            created_at: Utc::now(),
        };
        self.posts.push(stored.clone());
        Ok(Post {
            id: stored.id,
            content: stored.content,
            created_at: stored.created_at,
            user,
        })
    }

    async fn update_post(
        &mut self,
        id: PostId,
        content: PostContent,
    ) -> Result<Option<Post>, StoreError> {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == id) else {
            return Ok(None);
        };
        post.content = content;
        let post = post.clone();
        self.hydrate_post(&post).map(Some)
    }

    async fn delete_post(&mut self, id: PostId) -> Result<Option<Post>, StoreError> {
        let Some(index) = self.posts.iter().position(|post| post.id == id) else {
            return Ok(None);
        };
        let removed = self.posts.remove(index);
        self.comments.retain(|comment| comment.post_id != id);
        self.hydrate_post(&removed).map(Some)
    }

    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<_> = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        comments
            .into_iter()
            .map(|comment| self.hydrate_comment(comment))
            .collect()
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        self.comments
            .iter()
            .find(|comment| comment.id == id)
            .map(|comment| self.hydrate_comment(comment))
            .transpose()
    }

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment, StoreError> {
        if !self.posts.iter().any(|post| post.id == comment.post_id) {
            return Err(StoreError::UnknownPost);
        }
        self.author(comment.author)?;
        let stored = StoredComment {
            id: CommentId::generate(),
            post_id: comment.post_id,
            author: comment.author,
            content: comment.content,
            created_at: Utc::now(),
        };
        self.comments.push(stored.clone());
        self.hydrate_comment(&stored)
    }

    async fn delete_comment(&mut self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let Some(index) = self.comments.iter().position(|comment| comment.id == id) else {
            return Ok(None);
        };
        let removed = self.comments.remove(index);
        self.hydrate_comment(&removed).map(Some)
    }

    async fn create_verification_request(
        &mut self,
        request: NewVerificationRequest,
    ) -> Result<VerificationRequest, StoreError> {
        let stored = VerificationRequest {
            id: Uuid::new_v4().to_string(),
            fullname: request.fullname,
            email: request.email,
            reason: request.reason,
            proof: request.proof,
            created_at: Utc::now(),
        };
        self.verification_requests.push(stored.clone());
        Ok(stored)
    }
}
