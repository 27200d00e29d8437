mod support;

use reqwest::StatusCode;
use serde_json::{json, Value};

use support::{assert_silent, send_event, spawn_server, CREATOR};

#[tokio::test]
async fn online_users_include_connected_sessions() {
    let server = spawn_server().await;
    let creator = server.creator_token().await;
    let (alice_id, alice_token) = server.user_with_token(&creator, "alice", "user").await;

    let mut alice = server.join(&alice_token, "alice").await;
    send_event(&mut alice, json!({ "event": "heartbeat" })).await;
    assert_silent(&mut alice, 200).await;

    let online: Vec<Value> = server
        .client
        .get(server.url("/users/online"))
        .bearer_auth(&creator)
        .send()
        .await
        .expect("online request")
        .json()
        .await
        .expect("online json");
    assert!(online.iter().any(|user| user["id"] == alice_id));
    assert!(online.iter().all(|user| user.get("password").is_none()));
}

#[tokio::test]
async fn user_listing_requires_a_token() {
    let server = spawn_server().await;
    let creator = server.creator_token().await;
    server.create_user(&creator, "alice", "user").await;

    let response = server
        .client
        .get(server.url("/users"))
        .send()
        .await
        .expect("users request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("error json");
    assert_eq!(body["success"], false);

    let users: Vec<Value> = server
        .client
        .get(server.url("/users"))
        .bearer_auth(&creator)
        .send()
        .await
        .expect("users request")
        .json()
        .await
        .expect("users json");
    let names: Vec<&str> = users
        .iter()
        .filter_map(|user| user["username"].as_str())
        .collect();
    assert!(names.contains(&CREATOR));
    assert!(names.contains(&"alice"));
}

#[tokio::test]
async fn health_is_public() {
    let server = spawn_server().await;
    let response = server
        .client
        .get(format!("{}/health", server.base_http))
        .send()
        .await
        .expect("health request");
    assert_eq!(response.status(), StatusCode::OK);
}
