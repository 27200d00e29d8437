mod support;

use reqwest::StatusCode;
use serde_json::{json, Value};

use support::{next_event, next_event_named, send_event, spawn_server, CREATOR};

#[tokio::test]
async fn mute_and_unmute_broadcast_to_room() {
    let server = spawn_server().await;
    let creator = server.creator_token().await;
    let (alice_id, alice_token) = server.user_with_token(&creator, "alice", "user").await;
    let (_, mod_token) = server.user_with_token(&creator, "mallory", "moderator").await;

    let mut alice = server.join(&alice_token, "alice").await;
    let mut moderator = server.join(&mod_token, "mallory").await;
    next_event_named(&mut alice, "user_connected").await;

    let response = server
        .client
        .post(server.url("/moderation/mute"))
        .bearer_auth(&mod_token)
        .json(&json!({ "user_id": alice_id, "duration": "10m" }))
        .send()
        .await
        .expect("mute request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("mute json");
    assert_eq!(body["success"], true);

    for socket in [&mut alice, &mut moderator] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "user_muted");
        assert_eq!(event["data"]["username"], "alice");
        assert_eq!(event["data"]["moderator"], "mallory");
        assert_eq!(event["data"]["duration"], "10m");
    }

    send_event(&mut alice, json!({ "event": "send_message", "data": { "message": "let me talk" } })).await;
    let error = next_event(&mut alice).await;
    assert_eq!(error["event"], "message_error");
    assert_eq!(error["data"]["message"], "you are muted and cannot send messages");

    let response = server
        .client
        .post(server.url("/moderation/unmute"))
        .bearer_auth(&creator)
        .json(&json!({ "user_id": alice_id }))
        .send()
        .await
        .expect("unmute request");
    assert_eq!(response.status(), StatusCode::OK);

    for socket in [&mut alice, &mut moderator] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "user_unmuted");
        assert_eq!(event["data"]["username"], "alice");
        assert_eq!(event["data"]["moderator"], CREATOR);
    }

    send_event(&mut alice, json!({ "event": "send_message", "data": { "message": "thanks" } })).await;
    let event = next_event(&mut moderator).await;
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["data"]["text"], "thanks");
}

#[tokio::test]
async fn mute_rejections_map_to_status_codes() {
    let server = spawn_server().await;
    let creator = server.creator_token().await;
    let (alice_id, alice_token) = server.user_with_token(&creator, "alice", "user").await;
    let (bob_id, _) = server.user_with_token(&creator, "bob", "user").await;
    let (mod_id, mod_token) = server.user_with_token(&creator, "mallory", "moderator").await;

    let cases = [
        // 普通用户无权禁言
        (&alice_token, json!({ "user_id": bob_id, "duration": "1h" }), StatusCode::FORBIDDEN),
        // 管理人员不可被禁言
        (&creator, json!({ "user_id": mod_id, "duration": "1h" }), StatusCode::FORBIDDEN),
        (&mod_token, json!({ "user_id": 999_999, "duration": "1h" }), StatusCode::NOT_FOUND),
        (&mod_token, json!({ "user_id": alice_id, "duration": "custom" }), StatusCode::BAD_REQUEST),
        (&mod_token, json!({ "user_id": alice_id, "duration": "custom", "custom_minutes": 0 }), StatusCode::BAD_REQUEST),
        (&mod_token, json!({ "user_id": alice_id, "duration": "1y" }), StatusCode::BAD_REQUEST),
        (&mod_token, json!({ "user_id": alice_id, "duration": "custom", "custom_minutes": i64::MAX }), StatusCode::BAD_REQUEST),
        (&mod_token, json!({ "user_id": alice_id, "duration": "custom", "custom_minutes": 10_000_000_000_i64 }), StatusCode::BAD_REQUEST),
        // 权限检查先于时长校验
        (&alice_token, json!({ "user_id": bob_id, "duration": "custom", "custom_minutes": 0 }), StatusCode::FORBIDDEN),
    ];

    for (token, payload, expected) in cases {
        let response = server
            .client
            .post(server.url("/moderation/mute"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .expect("mute request");
        assert_eq!(response.status(), expected, "payload {payload}");
        let body: Value = response.json().await.expect("error json");
        assert_eq!(body["success"], false);
    }

    // 非 custom 时长忽略多余的 custom_minutes
    let response = server
        .client
        .post(server.url("/moderation/mute"))
        .bearer_auth(&mod_token)
        .json(&json!({ "user_id": bob_id, "duration": "10m", "custom_minutes": 0 }))
        .send()
        .await
        .expect("mute request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client
        .post(server.url("/moderation/mute"))
        .json(&json!({ "user_id": alice_id, "duration": "1h" }))
        .send()
        .await
        .expect("anonymous mute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
