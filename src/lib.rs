//! Fedgate - A federation engine for cross-domain social activity exchange
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Federation inbox                                         │
//! │  - Well-known discovery document                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Federation Engine                          │
//! │  - Endpoint discovery (SRV / well-known / fallback)         │
//! │  - Signed delivery with bounded fan-out                     │
//! │  - Inbound validation and dispatch                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - Store contract                                           │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for the federation surface
//! - `federation`: discovery, delivery, inbox processing, dispatch
//! - `service`: account and messaging business logic
//! - `crypto`: key pairs, hybrid encryption, signatures
//! - `data`: store contract and SQLite implementation
//! - `config`: configuration management
//! - `error`: error types

pub mod api;
pub mod config;
pub mod crypto;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use data::{DataStore, EntityId, FederatedIdentity, SqliteStore};
use federation::{DeliveryEngine, InboxProcessor, Resolver, SrvBackend};

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the store, resolver, and HTTP client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Data store (SQLite)
    pub store: Arc<SqliteStore>,

    /// Endpoint resolver with shared cache
    pub resolver: Arc<Resolver>,

    /// Outbound delivery engine
    pub delivery: Arc<DeliveryEngine>,

    /// Inbound activity processor
    pub inbox: Arc<InboxProcessor<SqliteStore>>,

    /// HTTP client for federation
    pub http_client: Arc<reqwest::Client>,
}

impl AppState {
    /// Initialize application state with DNS-backed SRV discovery
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        Self::new_with_srv(config, SrvBackend::dns()).await
    }

    /// Initialize application state with an explicit SRV backend
    ///
    /// # Steps
    /// 1. Connect to the SQLite store
    /// 2. Build the shared HTTP client
    /// 3. Build the resolver and delivery engine
    /// 4. Ensure the server identity exists
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new_with_srv(
        config: config::AppConfig,
        srv: SrvBackend,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite store
        let store = Arc::new(SqliteStore::connect(&config.database.path).await?);
        tracing::info!("Store connected");

        // 2. Shared HTTP client, injected everywhere it is needed
        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(format!("Fedgate/{}", config.server.domain))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );

        // 3. Resolver and delivery engine
        let resolver = Arc::new(Resolver::new(srv, http_client.clone(), &config.discovery));

        let server_identity = Self::ensure_server_identity(&store, &config).await?;
        let private_key_pem = server_identity
            .private_key_pem
            .clone()
            .ok_or_else(|| error::AppError::Config("Server identity has no private key".to_string()))?;

        let delivery = Arc::new(DeliveryEngine::new(
            http_client.clone(),
            resolver.clone(),
            config.server.domain.clone(),
            private_key_pem,
            &config.federation,
        ));

        // 4. Inbound processor
        let inbox = Arc::new(InboxProcessor::new(store.clone()));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            store,
            resolver,
            delivery,
            inbox,
            http_client,
        })
    }

    /// Ensure the server identity exists
    ///
    /// Creates the identity that signs outbound activities, generating
    /// its key pair on first boot. The key pair is never regenerated.
    async fn ensure_server_identity(
        store: &SqliteStore,
        config: &config::AppConfig,
    ) -> Result<FederatedIdentity, error::AppError> {
        let address = format!("{}@{}", config.server.actor, config.server.domain);

        if let Some(identity) = store.get_identity(&address).await? {
            tracing::info!(address = %address, "Server identity exists");
            return Ok(identity);
        }

        tracing::info!(address = %address, "Creating server identity...");

        let pair = crypto::generate_key_pair_with_bits(config.federation.key_bits)?;

        let identity = FederatedIdentity {
            id: EntityId::new().0,
            username: config.server.actor.clone(),
            domain: config.server.domain.clone(),
            public_key_pem: pair.public_key_pem,
            private_key_pem: Some(pair.private_key_pem),
            created_at: chrono::Utc::now(),
        };
        store.create_identity(&identity).await?;

        tracing::info!(address = %address, "Server identity created");
        Ok(identity)
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::wellknown_router())
        .merge(api::federation_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
