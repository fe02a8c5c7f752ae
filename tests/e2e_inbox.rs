//! E2E tests for the inbound federation flow
//!
//! Boots a real server and POSTs activity envelopes at its inbox.

mod common;

use chrono::Utc;
use common::TestServer;
use fedgate::crypto::{self, KeyPair, generate_key_pair_with_bits};
use fedgate::data::{ContentItem, DataStore, EntityId, FederatedIdentity};
use fedgate::federation::{ActivityEnvelope, MessagePayload, builder};

/// Seed a remote identity and return its key pair
async fn seed_remote_identity(server: &TestServer, username: &str, domain: &str) -> KeyPair {
    let pair = generate_key_pair_with_bits(1024).expect("key generation should work");

    server
        .state
        .store
        .create_identity(&FederatedIdentity {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: domain.to_string(),
            public_key_pem: pair.public_key_pem.clone(),
            private_key_pem: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    pair
}

/// Seed a local identity holding its private key
async fn seed_local_identity(server: &TestServer, username: &str) -> KeyPair {
    let pair = generate_key_pair_with_bits(1024).expect("key generation should work");

    server
        .state
        .store
        .create_identity(&FederatedIdentity {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: "test.example.com".to_string(),
            public_key_pem: pair.public_key_pem.clone(),
            private_key_pem: Some(pair.private_key_pem.clone()),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    pair
}

async fn seed_content(server: &TestServer, author: &str) -> String {
    let content = ContentItem {
        id: EntityId::new().0,
        author_address: author.to_string(),
        body: "hello fediverse".to_string(),
        like_count: 0,
        comment_count: 0,
        repost_count: 0,
        quote_count: 0,
        created_at: Utc::now(),
    };
    server.state.store.create_content(&content).await.unwrap();
    content.id
}

async fn post_activity(server: &TestServer, envelope: &ActivityEnvelope) -> reqwest::Response {
    server
        .client
        .post(format!("{}/inbox", server.addr))
        .header("Content-Type", "application/activity+json")
        .body(serde_json::to_vec(envelope).unwrap())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(format!("{}/health", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn wellknown_serves_discovery_document() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(format!("{}/.well-known/fedgate", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["server_url"], "http://test.example.com");
}

#[tokio::test]
async fn signed_follow_is_accepted_and_idempotent() {
    let server = TestServer::new().await;
    let pair = seed_remote_identity(&server, "alice", "remote.example").await;

    let mut envelope = builder::follow("alice@remote.example", "bob@test.example.com");
    envelope.sign_with(&pair.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "followed");

    // Re-delivery of the same follow is a no-op success
    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);

    let followers = server
        .state
        .store
        .followers_of("bob@test.example.com")
        .await
        .unwrap();
    assert_eq!(followers, vec!["alice@remote.example".to_string()]);
}

#[tokio::test]
async fn double_like_increments_counter_once() {
    let server = TestServer::new().await;
    let pair = seed_remote_identity(&server, "alice", "remote.example").await;
    let content_id = seed_content(&server, "bob@test.example.com").await;

    let mut envelope = builder::like("alice@remote.example", &content_id, None);
    envelope.sign_with(&pair.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "liked");
    assert!(body["created_id"].is_string());

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "already_liked");

    let content = server
        .state
        .store
        .get_content(&content_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(content.like_count, 1);
}

#[tokio::test]
async fn corrupted_signature_is_rejected_with_zero_writes() {
    let server = TestServer::new().await;
    let pair = seed_remote_identity(&server, "alice", "remote.example").await;

    let mut envelope = builder::follow("alice@remote.example", "bob@test.example.com");
    envelope.sign_with(&pair.private_key_pem).unwrap();
    envelope.signature = Some("ZmFrZS1zaWduYXR1cmU=".to_string());

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid signature");

    assert!(server
        .state
        .store
        .followers_of("bob@test.example.com")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unsigned_activity_is_rejected() {
    let server = TestServer::new().await;
    seed_remote_identity(&server, "alice", "remote.example").await;

    let envelope = builder::follow("alice@remote.example", "bob@test.example.com");
    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn blocked_domain_is_rejected() {
    let server = TestServer::new().await;
    let pair = seed_remote_identity(&server, "mallory", "evil.example").await;
    server.state.store.block_domain("evil.example").await.unwrap();

    let mut envelope = builder::follow("mallory@evil.example", "bob@test.example.com");
    envelope.sign_with(&pair.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Domain blocked");
}

#[tokio::test]
async fn unsupported_activity_type_is_rejected() {
    let server = TestServer::new().await;
    let pair = seed_remote_identity(&server, "alice", "remote.example").await;

    let mut envelope = builder::follow("alice@remote.example", "bob@test.example.com");
    envelope.kind = "Wave".to_string();
    envelope.sign_with(&pair.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Wave"));
}

#[tokio::test]
async fn malformed_json_is_rejected_with_error_body() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(format!("{}/inbox", server.addr))
        .header("Content-Type", "application/activity+json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn message_activity_stores_a_decryptable_message() {
    let server = TestServer::new().await;
    let alice = seed_remote_identity(&server, "alice", "remote.example").await;
    let bob = seed_local_identity(&server, "bob").await;

    let payload = crypto::encrypt_message("the plan is on", &bob.public_key_pem).unwrap();
    let message = MessagePayload {
        from: "alice@remote.example".to_string(),
        to: "bob@test.example.com".to_string(),
        payload,
    };

    let mut envelope = builder::message("alice@remote.example", &message);
    envelope.sign_with(&alice.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "delivered");
    let message_id = body["created_id"].as_str().unwrap().to_string();

    assert_eq!(
        server
            .state
            .store
            .unread_count("bob@test.example.com")
            .await
            .unwrap(),
        1
    );

    let stored = server
        .state
        .store
        .get_message(&message_id, "bob@test.example.com")
        .await
        .unwrap()
        .expect("message should exist");
    let plaintext = crypto::decrypt_message(&stored.payload(), &bob.private_key_pem).unwrap();
    assert_eq!(plaintext, "the plan is on");
}

#[tokio::test]
async fn message_between_blocking_parties_is_not_stored() {
    let server = TestServer::new().await;
    let alice = seed_remote_identity(&server, "alice", "remote.example").await;
    let bob = seed_local_identity(&server, "bob").await;

    server
        .state
        .store
        .add_block("bob@test.example.com", "alice@remote.example")
        .await
        .unwrap();

    let payload = crypto::encrypt_message("unwanted", &bob.public_key_pem).unwrap();
    let message = MessagePayload {
        from: "alice@remote.example".to_string(),
        to: "bob@test.example.com".to_string(),
        payload,
    };

    let mut envelope = builder::message("alice@remote.example", &message);
    envelope.sign_with(&alice.private_key_pem).unwrap();

    let response = post_activity(&server, &envelope).await;
    assert_eq!(response.status(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "not_allowed");

    assert_eq!(
        server
            .state
            .store
            .unread_count("bob@test.example.com")
            .await
            .unwrap(),
        0
    );
}
