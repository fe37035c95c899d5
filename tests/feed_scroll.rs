use std::sync::Arc;

use discuze::{
    routes, ApiClient, ClientError, Config, FeedPaginator, FeedStatus, FetchOutcome, MemoryStore,
    PostStore, Session, SkipReason, User, VerificationBody,
};
use tokio::sync::Mutex;

async fn spawn_server(users: &[&User]) -> ApiClient {
    let store = Arc::new(Mutex::new(MemoryStore::new()));
    for user in users {
        store
            .lock()
            .await
            .insert_user((*user).clone())
            .await
            .unwrap();
    }
    let (address, server) =
        warp::serve(routes(store, Config::default())).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    ApiClient::new(format!("http://{address}"))
}

fn session(user: &User) -> Session {
    Session { user_id: user.id }
}

#[tokio::test]
async fn scrolls_to_the_end() {
    let alice = User::new("Alice");
    let client = spawn_server(&[&alice]).await;
    for i in 0..12 {
        client
            .create_post(&session(&alice), &format!("post {i}"))
            .await
            .unwrap();
    }

    let mut feed = FeedPaginator::new(client);
    let mut lengths = Vec::new();
    while feed.has_more() {
        feed.fetch_next_page().await.unwrap();
        lengths.push((feed.posts().len(), feed.has_more()));
    }
    assert_eq!(lengths, [(5, true), (10, true), (12, false)]);
    assert_eq!(feed.posts()[0].content.as_str(), "post 11");
    assert_eq!(
        feed.fetch_next_page().await.unwrap(),
        FetchOutcome::Skipped(SkipReason::Exhausted)
    );
}

#[tokio::test]
async fn publishing_reloads_the_first_page() {
    let alice = User::new("Alice");
    let client = spawn_server(&[&alice]).await;
    for i in 0..12 {
        client
            .create_post(&session(&alice), &format!("post {i}"))
            .await
            .unwrap();
    }

    let mut feed = FeedPaginator::new(client);
    feed.fetch_next_page().await.unwrap();
    feed.fetch_next_page().await.unwrap();
    assert_eq!(feed.posts().len(), 10);

    feed.publish(&session(&alice), "fresh off the press")
        .await
        .unwrap();
    assert_eq!(feed.posts().len(), 5);
    assert_eq!(feed.posts()[0].content.as_str(), "fresh off the press");
    assert_eq!(feed.pages_loaded(), 1);
    assert!(feed.has_more());
}

#[tokio::test]
async fn rejected_post_leaves_the_feed_alone() {
    let alice = User::new("Alice");
    let client = spawn_server(&[&alice]).await;
    client.create_post(&session(&alice), "hello").await.unwrap();

    let mut feed = FeedPaginator::new(client);
    feed.fetch_next_page().await.unwrap();

    let error = feed
        .publish(&session(&alice), &"x".repeat(800))
        .await
        .unwrap_err();
    assert_eq!(
        error.user_message(),
        "Content must not exceed 799 characters"
    );
    assert_eq!(feed.posts().len(), 1);
    assert_eq!(feed.status(), &FeedStatus::Ready { has_more: false });
}

#[tokio::test]
async fn edits_and_deletes_patch_the_loaded_feed() {
    let alice = User::new("Alice");
    let bob = User::new("Bob");
    let client = spawn_server(&[&alice, &bob]).await;
    client.create_post(&session(&alice), "one").await.unwrap();
    client.create_post(&session(&alice), "two").await.unwrap();

    let mut feed = FeedPaginator::new(client);
    feed.fetch_next_page().await.unwrap();
    let newest = feed.posts()[0].id.clone();

    assert!(feed
        .edit(&session(&alice), &newest, "two, edited")
        .await
        .unwrap());
    assert_eq!(feed.posts()[0].content.as_str(), "two, edited");

    let error = feed.delete(&session(&bob), &newest).await.unwrap_err();
    assert!(matches!(error, ClientError::Rejected { status: 403, .. }));
    assert_eq!(feed.posts().len(), 2);

    assert!(feed.delete(&session(&alice), &newest).await.unwrap());
    assert_eq!(feed.posts().len(), 1);
    assert_eq!(feed.posts()[0].content.as_str(), "one");

    let comments = feed.fetcher().comments(&feed.posts()[0].id).await.unwrap();
    assert!(comments.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_an_error_state() {
    let mut feed = FeedPaginator::new(ApiClient::new("http://127.0.0.1:9"));
    let error = feed.fetch_next_page().await.unwrap_err();
    assert!(matches!(error, ClientError::Transport(_)));
    assert!(matches!(feed.status(), FeedStatus::Error(_)));
    assert!(feed.posts().is_empty());
    assert_eq!(feed.next_page(), 1);
}

#[tokio::test]
async fn profile_comment_and_verification_calls() {
    let alice = User::new("Alice");
    let bob = User::new("Bob");
    let client = spawn_server(&[&alice, &bob]).await;
    client.create_post(&session(&alice), "hello").await.unwrap();

    let posts = client.user_posts(alice.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert!(client.user_posts(bob.id).await.unwrap().is_empty());

    client
        .add_comment(&session(&bob), &posts[0].id, "hi back")
        .await
        .unwrap();
    let comments = client.comments(&posts[0].id).await.unwrap();
    assert_eq!(comments.len(), 1);
    let error = client
        .delete_comment(&session(&alice), &comments[0].id)
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::Rejected { status: 403, .. }));
    client
        .delete_comment(&session(&bob), &comments[0].id)
        .await
        .unwrap();
    assert!(client.comments(&posts[0].id).await.unwrap().is_empty());

    let updated = client.update_bio(&session(&alice), "Curious").await.unwrap();
    assert_eq!(updated.bio, "Curious");
    let updated = client
        .update_occupation(&session(&alice), "Explorer")
        .await
        .unwrap();
    assert_eq!(updated.occupation.as_deref(), Some("Explorer"));

    let request = client
        .get_verified(&VerificationBody {
            fullname: Some("Alice Liddell".into()),
            email: Some("alice@example.com".into()),
            reason: Some("famous".into()),
            proof: None,
        })
        .await
        .unwrap();
    assert_eq!(request.fullname, "Alice Liddell");

    let error = client
        .get_verified(&VerificationBody::default())
        .await
        .unwrap_err();
    assert_eq!(error.user_message(), "All fields are required.");
}
