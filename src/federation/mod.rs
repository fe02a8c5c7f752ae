//! Federation module
//!
//! Handles:
//! - Activity wire format and typed activity set
//! - Endpoint discovery (SRV, well-known, fallback)
//! - Signed activity delivery with bounded fan-out
//! - Inbound validation and dispatch

mod activity;
mod delivery;
mod discovery;
mod dispatch;
mod inbox;

pub use activity::{
    ACTIVITY_CONTENT_TYPE, Activity, ActivityEnvelope, DEFAULT_REACTION, MessagePayload, builder,
};
pub use delivery::{DeliveryEngine, DeliveryOutcome};
pub use discovery::{
    CacheStats, DiscoveryDocument, FALLBACK_HOST_PREFIX, Resolver, SRV_SERVICE, SrvBackend,
    WELL_KNOWN_PATH,
};
pub use dispatch::{DispatchOutcome, DispatchStatus, Dispatcher};
pub use inbox::InboxProcessor;
