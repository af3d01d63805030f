//! End-to-end tests for the HTTP surface.
//!
//! Spawns the real server (with mock collaborators) via `TestConfServer`
//! and drives it over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use conf_test_utils::TestConfServer;
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_and_ready(pool: PgPool) {
    let server = TestConfServer::spawn(pool).await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/v1/health", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client
        .get(format!("{}/v1/ready", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_conference_lifecycle_over_http(pool: PgPool) {
    let server = TestConfServer::spawn(pool).await.unwrap();
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let user = Uuid::new_v4();

    // Create
    let response = client
        .post(format!("{}/v1/conferences", server.url()))
        .json(&serde_json::json!({
            "name": "Retro",
            "chat_id": null,
            "creator_id": creator,
            "max_members": 5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let conference: serde_json::Value = response.json().await.unwrap();
    let conference_id = conference["conference_id"].as_str().unwrap().to_string();
    assert_eq!(conference["status"], "active");

    // Join
    let response = client
        .post(format!(
            "{}/v1/conferences/{}/join",
            server.url(),
            conference_id
        ))
        .json(&serde_json::json!({"user_id": user, "display_name": "Sam"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Roster has creator + joiner
    let response = client
        .get(format!(
            "{}/v1/conferences/{}/participants",
            server.url(),
            conference_id
        ))
        .send()
        .await
        .unwrap();
    let participants: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(participants.len(), 2);

    // A stranger ending the conference is rejected with the typed error body.
    let response = client
        .post(format!(
            "{}/v1/conferences/{}/end",
            server.url(),
            conference_id
        ))
        .json(&serde_json::json!({"actor_id": user}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    // The creator ends it.
    let response = client
        .post(format!(
            "{}/v1/conferences/{}/end",
            server.url(),
            conference_id
        ))
        .json(&serde_json::json!({"actor_id": creator}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // Events were published along the way.
    let kinds = server.events.kinds();
    assert!(kinds.contains(&"created"));
    assert!(kinds.contains(&"participant.joined"));
    assert!(kinds.contains(&"ended"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_conference_is_404(pool: PgPool) {
    let server = TestConfServer::spawn(pool).await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/v1/conferences/{}", server.url(), Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_call_flow_over_http(pool: PgPool) {
    let server = TestConfServer::spawn(pool).await.unwrap();
    let client = reqwest::Client::new();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let response = client
        .post(format!("{}/v1/calls", server.url()))
        .json(&serde_json::json!({"caller_id": alice, "callee_id": bob, "chat_id": null}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let call: serde_json::Value = response.json().await.unwrap();
    let call_id = call["call_id"].as_str().unwrap().to_string();

    // A second initiation involving a busy party conflicts.
    let response = client
        .post(format!("{}/v1/calls", server.url()))
        .json(&serde_json::json!({"caller_id": bob, "callee_id": Uuid::new_v4(), "chat_id": null}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let response = client
        .post(format!("{}/v1/calls/{}/answer", server.url(), call_id))
        .json(&serde_json::json!({"user_id": bob}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/v1/calls/{}/hangup", server.url(), call_id))
        .json(&serde_json::json!({"user_id": alice}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let ended: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ended["end_reason"], "user_hangup");

    let response = client
        .get(format!("{}/v1/users/{}/calls", server.url(), alice))
        .send()
        .await
        .unwrap();
    let history: serde_json::Value = response.json().await.unwrap();
    assert_eq!(history["calls"].as_array().unwrap().len(), 1);
}
