//! Inbound activity processing
//!
//! Validation pipeline for activities received from remote peers:
//! signature first, then the domain block list, then dispatch. Nothing
//! is written to the store until both checks pass. The processor keeps
//! no state between calls.

use std::sync::Arc;

use crate::data::DataStore;
use crate::error::AppError;

use super::activity::{Activity, ActivityEnvelope};
use super::dispatch::{DispatchOutcome, Dispatcher};

/// Validates and dispatches inbound activities
pub struct InboxProcessor<S> {
    store: Arc<S>,
    dispatcher: Dispatcher<S>,
}

impl<S: DataStore> InboxProcessor<S> {
    /// Create a new inbox processor over a data store
    pub fn new(store: Arc<S>) -> Self {
        let dispatcher = Dispatcher::new(store.clone());
        Self { store, dispatcher }
    }

    /// Process one inbound activity envelope
    ///
    /// # Pipeline
    /// 1. Verify the signature against the actor's known public key
    /// 2. Check the actor's domain against the block list
    /// 3. Parse the type token into the typed activity set
    /// 4. Dispatch to the per-type handler
    ///
    /// Each step short-circuits; side effects only happen in step 4.
    pub async fn receive(&self, envelope: ActivityEnvelope) -> Result<DispatchOutcome, AppError> {
        let actor_domain = envelope.actor_domain()?.to_string();

        // 1. Signature. An unknown actor has no key we trust, which is
        //    indistinguishable from a bad signature to the caller.
        let Some(public_key) = self.store.get_public_key(&envelope.actor).await? else {
            tracing::debug!(actor = %envelope.actor, "No public key for actor");
            return Err(AppError::InvalidSignature);
        };

        if !envelope.verify_with(&public_key) {
            tracing::debug!(actor = %envelope.actor, "Signature verification failed");
            return Err(AppError::InvalidSignature);
        }

        // 2. Domain block list
        if self.store.is_domain_blocked(&actor_domain).await? {
            tracing::debug!(domain = %actor_domain, "Rejected activity from blocked domain");
            return Err(AppError::DomainBlocked);
        }

        // 3. Closed activity set
        let activity = Activity::parse(&envelope.kind, &envelope.object)?;

        // 4. Dispatch
        self.dispatcher.dispatch(&envelope.actor, activity).await
    }
}
