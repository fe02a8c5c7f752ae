//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use fedgate::federation::SrvBackend;
use fedgate::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    /// Base URL of the bound listener (http://127.0.0.1:port)
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_srv(SrvBackend::Static(HashMap::new())).await
    }

    /// Create a test server with an explicit SRV backend
    pub async fn with_srv(srv: SrvBackend) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "http".to_string(),
                actor: "fedgate".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            federation: config::FederationConfig {
                timeout_seconds: 2,
                retry_attempts: 2,
                retry_delay_ms: 50,
                max_concurrent_deliveries: 10,
                // Small keys keep server boot fast in tests
                key_bits: 1024,
            },
            discovery: config::DiscoveryConfig {
                protocol: "http".to_string(),
                cache_ttl_seconds: 300,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new_with_srv(config, srv).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = fedgate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }
}

/// Behavior of a stubbed remote peer's inbox
#[derive(Debug, Clone, Copy)]
pub enum PeerBehavior {
    /// Accept every delivery with 202
    Accept,
    /// Sleep before answering, to trigger client-side timeouts
    Delay(Duration),
    /// Reject every delivery with the given status
    FailWith(u16),
    /// Reject the first delivery with 500, accept the rest
    FailFirstThenAccept,
}

/// Stubbed remote federation peer
///
/// Serves the well-known discovery document pointing at itself and an
/// inbox with the configured behavior. The peer's `domain` is its bound
/// `host:port`, so tier-2 discovery finds it over plain HTTP.
pub struct RemotePeer {
    pub domain: String,
    pub base_url: String,
    inbox_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    inbox_hits: Arc<AtomicUsize>,
}

impl RemotePeer {
    /// Bodies successfully accepted by the inbox
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.inbox_bodies.lock().unwrap().clone()
    }

    /// Total inbox requests seen, including rejected ones
    pub fn hits(&self) -> usize {
        self.inbox_hits.load(Ordering::SeqCst)
    }
}

/// Spawn a stubbed remote peer
pub async fn spawn_remote_peer(behavior: PeerBehavior) -> RemotePeer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let domain = format!("127.0.0.1:{}", addr.port());
    let base_url = format!("http://{}", domain);

    let inbox_bodies: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let inbox_hits = Arc::new(AtomicUsize::new(0));

    let document = serde_json::json!({ "server_url": base_url });
    let wellknown = get(move || {
        let document = document.clone();
        async move { axum::Json(document) }
    });

    let inbox = post({
        let inbox_bodies = inbox_bodies.clone();
        let inbox_hits = inbox_hits.clone();
        move |body: axum::body::Bytes| {
            let inbox_bodies = inbox_bodies.clone();
            let inbox_hits = inbox_hits.clone();
            async move {
                let attempt = inbox_hits.fetch_add(1, Ordering::SeqCst);

                match behavior {
                    PeerBehavior::Accept => {}
                    PeerBehavior::Delay(delay) => tokio::time::sleep(delay).await,
                    PeerBehavior::FailWith(status) => {
                        return StatusCode::from_u16(status).unwrap();
                    }
                    PeerBehavior::FailFirstThenAccept => {
                        if attempt == 0 {
                            return StatusCode::INTERNAL_SERVER_ERROR;
                        }
                    }
                }

                if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&body) {
                    inbox_bodies.lock().unwrap().push(value);
                }
                StatusCode::ACCEPTED
            }
        }
    });

    let app = Router::new()
        .route("/.well-known/fedgate", wellknown)
        .route("/inbox", inbox);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RemotePeer {
        domain,
        base_url,
        inbox_bodies,
        inbox_hits,
    }
}
