//! E2E tests for post creation, listings and deletion

mod common;

use common::TestServer;
use serde_json::{Value, json};

fn authors(posts: &Value) -> Vec<String> {
    posts
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["userId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_create_and_fetch_post() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    let id = server.create_post(&alice, "hello").await;

    let (status, post) = server.get_json(&format!("/api/posts/{id}"), Some(&bob)).await;
    assert_eq!(status, 200);
    assert_eq!(post["content"], "hello");
    assert_eq!(post["likesCount"], 0);
    assert_eq!(post["commentsCount"], 0);
    assert_eq!(post["repostsCount"], 0);
    assert_eq!(post["isLiked"], false);
    assert_eq!(post["isBookmarked"], false);
    assert_eq!(post["user"]["id"], "alice");
    // Other users' emails are never exposed
    assert!(post["user"].get("email").is_none());
}

#[tokio::test]
async fn test_create_post_rejects_empty_content() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .post(server.url("/api/posts"))
        .bearer_auth(&alice)
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_repost_of_missing_post_is_rejected() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .post(server.url("/api/posts"))
        .bearer_auth(&alice)
        .json(&json!({ "content": "look at this", "originalPostId": 999 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_repost_counts_toward_original() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    let original = server.create_post(&alice, "original").await;
    let response = server
        .client
        .post(server.url("/api/posts"))
        .bearer_auth(&bob)
        .json(&json!({ "content": "so true", "originalPostId": original }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let repost: Value = response.json().await.unwrap();
    assert_eq!(repost["isRepost"], true);
    assert_eq!(repost["originalPostId"], original);

    let (_, post) = server
        .get_json(&format!("/api/posts/{original}"), None)
        .await;
    assert_eq!(post["repostsCount"], 1);
}

#[tokio::test]
async fn test_get_missing_post_is_404() {
    let server = TestServer::new().await;

    let (status, _) = server.get_json("/api/posts/12345", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_explore_is_newest_first() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    let first = server.create_post(&alice, "first").await;
    let second = server.create_post(&bob, "second").await;
    let third = server.create_post(&alice, "third").await;

    for path in ["/api/posts", "/api/posts/explore"] {
        let (status, posts) = server.get_json(path, None).await;
        assert_eq!(status, 200);
        let ids: Vec<i64> = posts
            .as_array()
            .unwrap()
            .iter()
            .map(|post| post["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![third, second, first]);
    }
}

#[tokio::test]
async fn test_explore_pagination() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    for i in 0..5 {
        server.create_post(&alice, &format!("post {i}")).await;
    }

    let (_, page) = server
        .get_json("/api/posts/explore?limit=2&offset=1", None)
        .await;
    let contents: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["post 3", "post 2"]);

    let (_, past_end) = server
        .get_json("/api/posts/explore?limit=2&offset=10", None)
        .await;
    assert!(past_end.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_feed_contains_self_and_followed_authors_only() {
    let server = TestServer::new().await;
    let viewer = server.login("viewer").await;
    let u1 = server.login("u1").await;
    let u2 = server.login("u2").await;
    let stranger = server.login("stranger").await;

    server.create_post(&u1, "from u1").await;
    server.create_post(&u2, "from u2").await;
    server.create_post(&stranger, "from stranger").await;
    server.create_post(&viewer, "from viewer").await;

    for target in ["u1", "u2"] {
        let response = server
            .client
            .post(server.url(&format!("/api/users/{target}/follow")))
            .bearer_auth(&viewer)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let (status, feed) = server.get_json("/api/posts/feed", Some(&viewer)).await;
    assert_eq!(status, 200);
    assert_eq!(authors(&feed), vec!["viewer", "u2", "u1"]);
}

#[tokio::test]
async fn test_feed_without_follows_has_own_posts() {
    let server = TestServer::new().await;
    let loner = server.login("loner").await;
    let other = server.login("other").await;

    server.create_post(&other, "not mine").await;
    server.create_post(&loner, "mine").await;

    let (_, feed) = server.get_json("/api/posts/feed", Some(&loner)).await;
    assert_eq!(authors(&feed), vec!["loner"]);
}

#[tokio::test]
async fn test_feed_requires_auth() {
    let server = TestServer::new().await;

    let (status, _) = server.get_json("/api/posts/feed", None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_user_posts_listing() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    server.create_post(&alice, "a1").await;
    server.create_post(&bob, "b1").await;
    server.create_post(&alice, "a2").await;

    let (status, posts) = server.get_json("/api/posts/user/alice", None).await;
    assert_eq!(status, 200);
    assert_eq!(authors(&posts), vec!["alice", "alice"]);
    assert_eq!(posts[0]["content"], "a2");
}

#[tokio::test]
async fn test_only_owner_can_delete_post() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    let id = server.create_post(&alice, "keep me").await;

    let response = server
        .client
        .delete(server.url(&format!("/api/posts/{id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let (status, _) = server.get_json(&format!("/api/posts/{id}"), None).await;
    assert_eq!(status, 200);

    let response = server
        .client
        .delete(server.url(&format!("/api/posts/{id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let (status, _) = server.get_json(&format!("/api/posts/{id}"), None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_create_post_without_content_is_bad_request() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .post(server.url("/api/posts"))
        .bearer_auth(&alice)
        .json(&json!({ "imageUrl": "https://img.example.com/a.png" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("content"));

    let (_, posts) = server.get_json("/api/posts", None).await;
    assert!(posts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_post_with_malformed_json_is_bad_request() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .post(server.url("/api/posts"))
        .bearer_auth(&alice)
        .header("Content-Type", "application/json")
        .body("{\"content\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_non_numeric_post_id_is_bad_request() {
    let server = TestServer::new().await;

    let (status, body) = server.get_json("/api/posts/not-a-number", None).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_invalid_pagination_is_bad_request() {
    let server = TestServer::new().await;

    let (status, body) = server.get_json("/api/posts?limit=lots", None).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}
