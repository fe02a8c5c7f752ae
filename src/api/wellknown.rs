//! Well-known endpoints
//!
//! Serves the discovery document consumed by tier-2 endpoint discovery
//! on remote servers.

use axum::{Router, extract::State, response::Json, routing::get};

use crate::AppState;
use crate::federation::{DiscoveryDocument, WELL_KNOWN_PATH};

/// Create well-known router
///
/// Routes:
/// - GET /.well-known/fedgate
pub fn wellknown_router() -> Router<AppState> {
    Router::new().route(WELL_KNOWN_PATH, get(discovery_document))
}

/// GET /.well-known/fedgate
///
/// Returns `{"server_url": "<base url>"}` for remote resolvers.
async fn discovery_document(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(DiscoveryDocument {
        server_url: state.config.server.base_url(),
    })
}
