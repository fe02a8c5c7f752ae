//! API layer
//!
//! HTTP handlers for:
//! - Federation inbox
//! - Well-known discovery document
//! - Metrics (Prometheus)

mod inbox;
pub mod metrics;
mod wellknown;

pub use inbox::federation_router;
pub use metrics::metrics_router;
pub use wellknown::wellknown_router;
