//! Activity delivery
//!
//! Signs outbound activities and POSTs them to resolved remote
//! endpoints with bounded-concurrency fan-out, per-target timeout, and
//! bounded retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::FederationConfig;
use crate::error::AppError;
use crate::metrics::{DELIVERIES_TOTAL, DELIVERY_DURATION_SECONDS};

use super::activity::{ACTIVITY_CONTENT_TYPE, ActivityEnvelope};
use super::discovery::Resolver;

/// Result of a delivery attempt series against one domain
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Target domain
    pub domain: String,
    /// Whether any attempt succeeded
    pub success: bool,
    /// Attempts made (including the successful one)
    pub attempts: u32,
    /// Last error message if all attempts failed
    pub error: Option<String>,
}

/// Deduplicate target domains while preserving order.
///
/// A single activity is never delivered twice to the same domain within
/// one fan-out.
fn unique_target_domains(domains: Vec<String>) -> Vec<String> {
    use std::collections::HashSet;

    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for domain in domains {
        if seen.contains(&domain) {
            continue;
        }
        seen.insert(domain.clone());
        targets.push(domain);
    }

    targets
}

/// Outbound activity delivery service
///
/// Holds the injected HTTP client and resolver; never reaches for
/// ambient global state.
#[derive(Clone)]
pub struct DeliveryEngine {
    http_client: Arc<reqwest::Client>,
    resolver: Arc<Resolver>,
    /// Local domain advertised in the User-Agent header
    local_domain: String,
    /// Server identity key used to sign outbound activities
    private_key_pem: String,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    max_concurrent: usize,
}

impl DeliveryEngine {
    /// Create a new delivery engine
    pub fn new(
        http_client: Arc<reqwest::Client>,
        resolver: Arc<Resolver>,
        local_domain: String,
        private_key_pem: String,
        config: &FederationConfig,
    ) -> Self {
        Self {
            http_client,
            resolver,
            local_domain,
            private_key_pem,
            timeout: Duration::from_secs(config.timeout_seconds),
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_concurrent: config.max_concurrent_deliveries,
        }
    }

    /// Deliver an activity to a single domain
    ///
    /// Convenience wrapper returning only the success flag.
    pub async fn deliver(&self, activity: &ActivityEnvelope, target_domain: &str) -> bool {
        self.deliver_with_outcome(activity, target_domain)
            .await
            .success
    }

    /// Deliver an activity to a single domain with full outcome detail
    ///
    /// Signs the activity once, then attempts delivery up to the
    /// configured retry budget with a delay between attempts. Every
    /// failed attempt invalidates the cached endpoint so the next
    /// attempt re-resolves rather than re-using a stale entry.
    pub async fn deliver_with_outcome(
        &self,
        activity: &ActivityEnvelope,
        target_domain: &str,
    ) -> DeliveryOutcome {
        let started = Instant::now();

        let body = match self.prepare_body(activity) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(domain = %target_domain, error = %e, "Failed to prepare activity");
                DELIVERIES_TOTAL.with_label_values(&["failure"]).inc();
                return DeliveryOutcome {
                    domain: target_domain.to_string(),
                    success: false,
                    attempts: 0,
                    error: Some(e.to_string()),
                };
            }
        };

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match self.attempt(&body, target_domain).await {
                Ok(()) => {
                    tracing::info!(domain = %target_domain, attempt, "Activity delivered");
                    DELIVERIES_TOTAL.with_label_values(&["success"]).inc();
                    DELIVERY_DURATION_SECONDS
                        .with_label_values(&["success"])
                        .observe(started.elapsed().as_secs_f64());
                    return DeliveryOutcome {
                        domain: target_domain.to_string(),
                        success: true,
                        attempts: attempt,
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(domain = %target_domain, attempt, error = %e, "Delivery attempt failed");
                    // A stale cached endpoint must not become a permanent failure.
                    self.resolver.invalidate(target_domain).await;
                    last_error = Some(e.to_string());

                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        DELIVERIES_TOTAL.with_label_values(&["failure"]).inc();
        DELIVERY_DURATION_SECONDS
            .with_label_values(&["failure"])
            .observe(started.elapsed().as_secs_f64());

        DeliveryOutcome {
            domain: target_domain.to_string(),
            success: false,
            attempts: self.retry_attempts,
            error: last_error,
        }
    }

    /// Sign the activity with the server identity key and serialize it
    fn prepare_body(&self, activity: &ActivityEnvelope) -> Result<Vec<u8>, AppError> {
        let mut signed = activity.clone();
        signed.sign_with(&self.private_key_pem)?;
        serde_json::to_vec(&signed)
            .map_err(|e| AppError::Validation(format!("Failed to serialize activity: {}", e)))
    }

    /// One POST attempt against one domain
    async fn attempt(&self, body: &[u8], target_domain: &str) -> Result<(), AppError> {
        // Resolution failure means no network call is made at all.
        let endpoint = self.resolver.resolve(target_domain).await?;
        let url = format!("{}/inbox", endpoint.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", ACTIVITY_CONTENT_TYPE)
            .header("User-Agent", format!("Fedgate/{}", self.local_domain))
            .header("Date", Utc::now().to_rfc2822())
            .timeout(self.timeout)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| AppError::DeliveryFailed(format!("{}: {}", target_domain, e)))?;

        match response.status().as_u16() {
            200 | 202 => Ok(()),
            status => Err(AppError::DeliveryFailed(format!(
                "{}: HTTP {}",
                target_domain, status
            ))),
        }
    }

    /// Deliver one activity to many domains concurrently
    ///
    /// Targets are deduplicated, then delivered under a semaphore capped
    /// at the configured maximum so one slow peer cannot serialize the
    /// batch. Per-target failures never abort the others.
    pub async fn deliver_to_domains(
        &self,
        activity: &ActivityEnvelope,
        target_domains: Vec<String>,
    ) -> Vec<DeliveryOutcome> {
        use tokio::sync::Semaphore;

        let total_targets = target_domains.len();
        let targets = unique_target_domains(target_domains);

        tracing::info!(
            "Delivering to {} unique domains (deduplicated from {} total)",
            targets.len(),
            total_targets
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let activity = Arc::new(activity.clone());

        let mut tasks = Vec::new();

        for domain in targets {
            let semaphore = semaphore.clone();
            let activity = activity.clone();
            let engine = self.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                engine.deliver_with_outcome(&activity, &domain).await
            });

            tasks.push(task);
        }

        let results: Vec<DeliveryOutcome> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect();

        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;

        tracing::info!(
            "Batch delivery complete: {} succeeded, {} failed",
            success_count,
            failure_count
        );

        results
    }
}
