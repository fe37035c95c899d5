use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Author, Comment, CommentId, FeedPage, NewComment, NewPost, NewVerificationRequest, Page, Post,
    PostId, PostSummary, User, UserId, UserProfile, VerificationRequest,
};
use crate::store::PostStore;
use crate::validation::{CommentContent, PostContent};

const POST_COLUMNS: &str = "p.id, p.content, p.created_at, u.id, u.name, u.image, u.is_verified";
const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.content, c.created_at, u.id, u.name, u.image, u.is_verified";
const USER_COLUMNS: &str = "id, name, email, image, bio, occupation, is_verified, created_at";

/// SQLite-backed store. Timestamps are stored as microseconds since the epoch.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        info!("Opening database {:?}", path.as_ref());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self, StoreError> {
        initialize_db(&db)?;
        Ok(SqliteStore {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn initialize_db(db: &Connection) -> rusqlite::Result<()> {
    db.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            image TEXT,
            bio TEXT NOT NULL DEFAULT '',
            occupation TEXT,
            is_verified INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS posts_created_at ON posts (created_at);
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS verification_requests (
            id TEXT PRIMARY KEY,
            fullname TEXT NOT NULL,
            email TEXT NOT NULL,
            reason TEXT NOT NULL,
            proof TEXT,
            created_at INTEGER NOT NULL
        );",
    )
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn timestamp(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(index)?;
    DateTime::from_timestamp_micros(micros).ok_or(rusqlite::Error::IntegralValueOutOfRange(
        index, micros,
    ))
}

fn user_id(row: &Row, index: usize) -> rusqlite::Result<UserId> {
    let raw: String = row.get(index)?;
    Uuid::parse_str(&raw)
        .map(UserId)
        .map_err(|e| conversion_error(index, e))
}

fn author_from_row(row: &Row, offset: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        id: user_id(row, offset)?,
        name: row.get(offset + 1)?,
        image: row.get(offset + 2)?,
        is_verified: row.get(offset + 3)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        content: PostContent::parse(row.get::<_, String>(1)?)
            .map_err(|e| conversion_error(1, e))?,
        created_at: timestamp(row, 2)?,
        user: author_from_row(row, 3)?,
    })
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        post_id: PostId(row.get(1)?),
        content: CommentContent::parse(row.get::<_, String>(2)?)
            .map_err(|e| conversion_error(2, e))?,
        created_at: timestamp(row, 3)?,
        user: author_from_row(row, 4)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: user_id(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        bio: row.get(4)?,
        occupation: row.get(5)?,
        is_verified: row.get(6)?,
        created_at: timestamp(row, 7)?,
    })
}

fn select_user(db: &Connection, id: UserId) -> rusqlite::Result<Option<User>> {
    db.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        user_from_row,
    )
    .optional()
}

fn select_post(db: &Connection, id: &PostId) -> rusqlite::Result<Option<Post>> {
    db.query_row(
        &format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?1"
        ),
        params![id.0],
        post_from_row,
    )
    .optional()
}

fn select_comment(db: &Connection, id: &CommentId) -> rusqlite::Result<Option<Comment>> {
    db.query_row(
        &format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c
             JOIN users u ON u.id = c.user_id WHERE c.id = ?1"
        ),
        params![id.0],
        comment_from_row,
    )
    .optional()
}

fn select_user_posts(db: &Connection, id: UserId) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = db.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id \
         WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC"
    ))?;
    let posts = stmt
        .query_map(params![id.to_string()], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

impl PostStore for SqliteStore {
    async fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO users (id, name, email, image, bio, occupation, is_verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                image = excluded.image,
                bio = excluded.bio,
                occupation = excluded.occupation,
                is_verified = excluded.is_verified",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.image,
                user.bio,
                user.occupation,
                user.is_verified,
                user.created_at.timestamp_micros(),
            ],
        )?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let db = self.db.lock().await;
        Ok(select_user(&db, id)?)
    }

    async fn search_users(&self, query: String) -> Result<Vec<Author>, StoreError> {
        let db = self.db.lock().await;
        // instr() keeps LIKE wildcards in the query literal
        let mut stmt = db.prepare(
            "SELECT id, name, image, is_verified FROM users
             WHERE instr(lower(name), lower(?1)) > 0
             ORDER BY name",
        )?;
        let users = stmt
            .query_map(params![query], |row| author_from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn update_bio(&mut self, id: UserId, bio: String) -> Result<Option<User>, StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE users SET bio = ?2 WHERE id = ?1",
            params![id.to_string(), bio],
        )?;
        Ok(select_user(&db, id)?)
    }

    async fn update_occupation(
        &mut self,
        id: UserId,
        occupation: String,
    ) -> Result<Option<User>, StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE users SET occupation = ?2 WHERE id = ?1",
            params![id.to_string(), occupation],
        )?;
        Ok(select_user(&db, id)?)
    }

    async fn user_profile(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let db = self.db.lock().await;
        let Some(user) = select_user(&db, id)? else {
            return Ok(None);
        };
        let posts = select_user_posts(&db, id)?
            .into_iter()
            .map(PostSummary::from)
            .collect();
        Ok(Some(UserProfile::new(user, posts)))
    }

    async fn list_posts(&self, page: Page) -> Result<FeedPage, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id \
             ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let posts = stmt
            .query_map(
                params![page.limit() as i64, page.skip() as i64],
                post_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let total: i64 = db.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        let has_more = page.has_more(posts.len(), total.max(0) as usize);
        Ok(FeedPage { posts, has_more })
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let db = self.db.lock().await;
        Ok(select_post(&db, &id)?)
    }

    async fn user_posts(&self, id: UserId) -> Result<Vec<Post>, StoreError> {
        let db = self.db.lock().await;
        Ok(select_user_posts(&db, id)?)
    }

    async fn create_post(&mut self, post: NewPost) -> Result<Post, StoreError> {
        let db = self.db.lock().await;
        if select_user(&db, post.author)?.is_none() {
            return Err(StoreError::UnknownUser);
        }
        let id = PostId::generate();
        db.execute(
            "INSERT INTO posts (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.0,
                post.author.to_string(),
                post.content.as_str(),
                Utc::now().timestamp_micros()
            ],
        )?;
        select_post(&db, &id)?.ok_or(StoreError::UnknownPost)
    }

    async fn update_post(
        &mut self,
        id: PostId,
        content: PostContent,
    ) -> Result<Option<Post>, StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE posts SET content = ?2 WHERE id = ?1",
            params![id.0, content.as_str()],
        )?;
        Ok(select_post(&db, &id)?)
    }

    async fn delete_post(&mut self, id: PostId) -> Result<Option<Post>, StoreError> {
        let db = self.db.lock().await;
        let Some(post) = select_post(&db, &id)? else {
            return Ok(None);
        };
        db.execute("DELETE FROM posts WHERE id = ?1", params![id.0])?;
        Ok(Some(post))
    }

    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC"
        ))?;
        let comments = stmt
            .query_map(params![post.0], comment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let db = self.db.lock().await;
        Ok(select_comment(&db, &id)?)
    }

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment, StoreError> {
        let db = self.db.lock().await;
        if select_post(&db, &comment.post_id)?.is_none() {
            return Err(StoreError::UnknownPost);
        }
        if select_user(&db, comment.author)?.is_none() {
            return Err(StoreError::UnknownUser);
        }
        let id = CommentId::generate();
        db.execute(
            "INSERT INTO comments (id, post_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.0,
                comment.post_id.0,
                comment.author.to_string(),
                comment.content.as_str(),
                Utc::now().timestamp_micros()
            ],
        )?;
        select_comment(&db, &id)?
            .ok_or_else(|| StoreError::Corrupt(format!("comment {id} vanished after insert")))
    }

    async fn delete_comment(&mut self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let db = self.db.lock().await;
        let Some(comment) = select_comment(&db, &id)? else {
            return Ok(None);
        };
        db.execute("DELETE FROM comments WHERE id = ?1", params![id.0])?;
        Ok(Some(comment))
    }

    async fn create_verification_request(
        &mut self,
        request: NewVerificationRequest,
    ) -> Result<VerificationRequest, StoreError> {
        let db = self.db.lock().await;
        let stored = VerificationRequest {
            id: Uuid::new_v4().to_string(),
            fullname: request.fullname,
            email: request.email,
            reason: request.reason,
            proof: request.proof,
            created_at: Utc::now(),
        };
        db.execute(
            "INSERT INTO verification_requests (id, fullname, email, reason, proof, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stored.id,
                stored.fullname,
                stored.email,
                stored.reason,
                stored.proof,
                stored.created_at.timestamp_micros()
            ],
        )?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn pages_walk_newest_first() {
        conformance::pages_walk_newest_first(store()).await;
    }

    #[tokio::test]
    async fn post_lifecycle() {
        conformance::post_lifecycle(store()).await;
    }

    #[tokio::test]
    async fn unknown_author_is_rejected() {
        conformance::unknown_author_is_rejected(store()).await;
    }

    #[tokio::test]
    async fn comments_follow_their_post() {
        conformance::comments_follow_their_post(store()).await;
    }

    #[tokio::test]
    async fn users_and_profiles() {
        conformance::users_and_profiles(store()).await;
    }

    #[tokio::test]
    async fn verification_requests() {
        conformance::verification_requests(store()).await;
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let mut store = store();
        conformance::seed_user(&mut store, "Ada").await;
        assert!(store.search_users("%".into()).await.unwrap().is_empty());
    }
}
