use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    CommentId, CreateCommentBody, CreatePostBody, NewComment, NewPost, NewVerificationRequest,
    Outcome, OutcomeWith, Page, PageQuery, PostId, PostPayload, SearchQuery, SearchResult,
    Session, UpdateBioBody, UpdateOccupationBody, UpdatePostBody, UserId, UserPayload,
    VerificationBody,
};
use crate::store::PostStore;
use crate::validation::{self, CommentContent, FieldError, PostContent};

type Shared<S> = Arc<Mutex<S>>;

fn require(session: Option<Session>) -> Result<Session, ApiError> {
    session.ok_or(ApiError::Unauthorized)
}

fn ensure_owner(session: &Session, owner: UserId) -> Result<(), ApiError> {
    if session.user_id == owner {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn parse_page(raw: Option<String>) -> Result<u32, ApiError> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|page| *page > 0)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid page: {raw:?}")))
}

fn path_user_id(raw: &str) -> Result<UserId, ApiError> {
    Uuid::parse_str(raw)
        .map(UserId)
        .map_err(|_| ApiError::BadRequest("Invalid userId".into()))
}

/// `GET /api/allposts?page=N`
pub async fn list_posts<S: PostStore + Send + Sync + 'static>(
    query: PageQuery,
    store: Shared<S>,
    config: Config,
) -> Result<impl Reply, Rejection> {
    let page = Page::new(parse_page(query.page)?, config.page_size);
    let feed = store
        .lock()
        .await
        .list_posts(page)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&feed))
}

/// `GET /api/allposts/:id`
pub async fn get_post<S: PostStore + Send + Sync + 'static>(
    id: String,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let post = store
        .lock()
        .await
        .get_post(PostId(id))
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("Post not found"))?;
    Ok(warp::reply::json(&post))
}

/// `GET /api/allposts/:id/comments`
pub async fn post_comments<S: PostStore + Send + Sync + 'static>(
    id: String,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let comments = store
        .lock()
        .await
        .list_comments(PostId(id))
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&comments))
}

/// `POST /api/create`
pub async fn create_post<S: PostStore + Send + Sync + 'static>(
    session: Option<Session>,
    body: CreatePostBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let (author, content) = validation::collect(
        validation::user_id(body.user_id.as_deref()),
        PostContent::parse(body.content.unwrap_or_default()),
    )
    .map_err(ApiError::Validation)?;
    ensure_owner(&session, author)?;

    let post = store
        .lock()
        .await
        .create_post(NewPost { author, content })
        .await
        .map_err(ApiError::from)?;
    info!("Created post {} by {}", post.id, post.user.id);

    Ok(warp::reply::with_status(
        warp::reply::json(&Outcome::ok("Post added successfully")),
        StatusCode::CREATED,
    ))
}

/// `PUT /api/update/:id`
pub async fn update_post<S: PostStore + Send + Sync + 'static>(
    id: String,
    session: Option<Session>,
    body: UpdatePostBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let content = PostContent::parse(body.content.unwrap_or_default())
        .map_err(|e| ApiError::BadRequest(e.message))?;
    let id = PostId(id);

    let mut store = store.lock().await;
    let existing = store
        .get_post(id.clone())
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("Post not found"))?;
    ensure_owner(&session, existing.user.id)?;

    let post = store
        .update_post(id, content)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("Post not found"))?;
    Ok(warp::reply::json(&OutcomeWith::ok(
        "Post updated successfully",
        PostPayload { post },
    )))
}

/// `DELETE /api/delete/:id`
pub async fn delete_post<S: PostStore + Send + Sync + 'static>(
    id: String,
    session: Option<Session>,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let id = PostId(id);

    let mut store = store.lock().await;
    let existing = store
        .get_post(id.clone())
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("Post not found"))?;
    ensure_owner(&session, existing.user.id)?;

    store.delete_post(id.clone()).await.map_err(ApiError::from)?;
    info!("Deleted post {id}");
    Ok(warp::reply::json(&Outcome::ok("Post deleted successfully")))
}

/// `GET /api/userposts/:userId`
pub async fn user_posts<S: PostStore + Send + Sync + 'static>(
    user_id: String,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let user_id = path_user_id(&user_id)?;
    let posts = store
        .lock()
        .await
        .user_posts(user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&posts))
}

/// `POST /api/comments`
pub async fn create_comment<S: PostStore + Send + Sync + 'static>(
    session: Option<Session>,
    body: CreateCommentBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let post_id = body
        .post_id
        .filter(|id| !id.is_empty())
        .map(PostId)
        .ok_or_else(|| FieldError::new("postId", "Post is required"));
    let (post_id, content) = validation::collect(
        post_id,
        CommentContent::parse(body.content.unwrap_or_default()),
    )
    .map_err(ApiError::Validation)?;

    let comment = store
        .lock()
        .await
        .create_comment(NewComment {
            post_id,
            author: session.user_id,
            content,
        })
        .await
        .map_err(ApiError::from)?;
    info!("Created comment {} on post {}", comment.id, comment.post_id);

    Ok(warp::reply::with_status(
        warp::reply::json(&Outcome::ok("Comment added successfully")),
        StatusCode::CREATED,
    ))
}

/// `DELETE /api/comments/:id`
pub async fn delete_comment<S: PostStore + Send + Sync + 'static>(
    id: String,
    session: Option<Session>,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let id = CommentId(id);

    let mut store = store.lock().await;
    let existing = store
        .get_comment(id.clone())
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    ensure_owner(&session, existing.user.id)?;

    store.delete_comment(id).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&Outcome::ok("Comment deleted successfully")))
}

/// `GET /api/userprofile/:userId`
pub async fn user_profile<S: PostStore + Send + Sync + 'static>(
    user_id: String,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let user_id = path_user_id(&user_id)?;
    let profile = store
        .lock()
        .await
        .user_profile(user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(warp::reply::json(&profile))
}

/// `GET /api/searchusers?query=`
pub async fn search_users<S: PostStore + Send + Sync + 'static>(
    query: SearchQuery,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let query = query.query.unwrap_or_default();
    let query = query.trim();
    let users = if query.is_empty() {
        Vec::new()
    } else {
        store
            .lock()
            .await
            .search_users(query.to_owned())
            .await
            .map_err(ApiError::from)?
    };
    Ok(warp::reply::json(&SearchResult { users }))
}

/// `PUT /api/updatebio`
pub async fn update_bio<S: PostStore + Send + Sync + 'static>(
    session: Option<Session>,
    body: UpdateBioBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let (user_id, bio) = validation::collect(
        validation::user_id(body.user_id.as_deref()),
        validation::bio(body.bio),
    )
    .map_err(ApiError::Validation)?;
    ensure_owner(&session, user_id)?;

    let user = store
        .lock()
        .await
        .update_bio(user_id, bio)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(warp::reply::json(&OutcomeWith::ok(
        "Bio updated successfully",
        UserPayload { user },
    )))
}

/// `PUT /api/updateoccupation`
pub async fn update_occupation<S: PostStore + Send + Sync + 'static>(
    session: Option<Session>,
    body: UpdateOccupationBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let session = require(session)?;
    let (user_id, occupation) = validation::collect(
        validation::user_id(body.user_id.as_deref()),
        validation::occupation(body.occupation),
    )
    .map_err(ApiError::Validation)?;
    ensure_owner(&session, user_id)?;

    let user = store
        .lock()
        .await
        .update_occupation(user_id, occupation)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(warp::reply::json(&OutcomeWith::ok(
        "Occupation updated successfully",
        UserPayload { user },
    )))
}

/// `POST /api/getverified`
pub async fn get_verified<S: PostStore + Send + Sync + 'static>(
    body: VerificationBody,
    store: Shared<S>,
) -> Result<impl Reply, Rejection> {
    let request = NewVerificationRequest::new(body.fullname, body.email, body.reason, body.proof)
        .map_err(|e| ApiError::BadRequest(e.message))?;
    let stored = store
        .lock()
        .await
        .create_verification_request(request)
        .await
        .map_err(ApiError::from)?;
    info!("Stored verification request {}", stored.id);
    Ok(warp::reply::json(&stored))
}
