//! Endpoint discovery
//!
//! Maps a remote domain to its federation endpoint URL using a
//! three-tier strategy: SRV record, well-known document, deterministic
//! fallback host. Successful resolutions are cached with a TTL; entries
//! are advisory and are invalidated when delivery to a cached endpoint
//! fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::DiscoveryConfig;
use crate::error::AppError;
use crate::metrics::DISCOVERY_CACHE_HITS_TOTAL;

/// Well-known path serving the discovery document
pub const WELL_KNOWN_PATH: &str = "/.well-known/fedgate";

/// SRV service prefix for federation endpoints
pub const SRV_SERVICE: &str = "_fedgate._tcp";

/// Host prefix for the deterministic fallback endpoint
pub const FALLBACK_HOST_PREFIX: &str = "federate";

/// Discovery document served at the well-known path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub server_url: String,
}

/// SRV lookup backend
///
/// DNS in production; fixed answers for tests and air-gapped
/// deployments; disabled to skip the SRV tier entirely.
pub enum SrvBackend {
    Dns(TokioAsyncResolver),
    Static(HashMap<String, (String, u16)>),
    Disabled,
}

impl SrvBackend {
    /// Build the DNS backend from the system resolver configuration,
    /// falling back to the library defaults when none is readable.
    pub fn dns() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::warn!(error = %e, "No usable system DNS configuration, using defaults");
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self::Dns(resolver)
    }

    async fn lookup(&self, domain: &str) -> Option<(String, u16)> {
        match self {
            Self::Dns(resolver) => {
                let name = format!("{}.{}.", SRV_SERVICE, domain);
                match resolver.srv_lookup(name.as_str()).await {
                    Ok(lookup) => lookup.iter().next().map(|srv| {
                        let target = srv.target().to_utf8();
                        (target.trim_end_matches('.').to_string(), srv.port())
                    }),
                    Err(e) => {
                        tracing::debug!(domain = %domain, error = %e, "SRV lookup failed");
                        None
                    }
                }
            }
            Self::Static(map) => map.get(domain).cloned(),
            Self::Disabled => None,
        }
    }
}

/// Cached endpoint resolution
#[derive(Debug, Clone)]
struct CachedEndpoint {
    url: String,
    resolved_at: Instant,
    ttl: Duration,
}

impl CachedEndpoint {
    fn is_valid(&self) -> bool {
        self.resolved_at.elapsed() < self.ttl
    }
}

/// Accept only well-formed http(s) URLs with a host
fn normalize_endpoint(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    parsed.host_str()?;
    Some(raw.trim_end_matches('/').to_string())
}

/// Domain-to-endpoint resolver with a shared TTL cache
pub struct Resolver {
    srv: SrvBackend,
    http_client: Arc<reqwest::Client>,
    scheme: String,
    cache: RwLock<HashMap<String, CachedEndpoint>>,
    ttl: Duration,
}

impl Resolver {
    /// Create a new resolver
    ///
    /// The HTTP client is injected so the resolver shares the
    /// application connection pool.
    pub fn new(srv: SrvBackend, http_client: Arc<reqwest::Client>, config: &DiscoveryConfig) -> Self {
        Self {
            srv,
            http_client,
            scheme: config.protocol.clone(),
            cache: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.cache_ttl_seconds),
        }
    }

    /// Resolve a domain to its federation endpoint URL
    ///
    /// Checks the cache first; on miss, walks the three tiers in order.
    /// A tier failure is swallowed and the next tier attempted. Fails
    /// only when no tier yields a well-formed endpoint URL.
    pub async fn resolve(&self, domain: &str) -> Result<String, AppError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(domain) {
                if cached.is_valid() {
                    tracing::debug!(domain = %domain, "Endpoint cache hit");
                    DISCOVERY_CACHE_HITS_TOTAL.with_label_values(&["hit"]).inc();
                    return Ok(cached.url.clone());
                }
                tracing::debug!(domain = %domain, "Endpoint cache expired");
            }
        }

        DISCOVERY_CACHE_HITS_TOTAL.with_label_values(&["miss"]).inc();
        let url = self.resolve_uncached(domain).await?;

        {
            let mut cache = self.cache.write().await;
            cache.insert(
                domain.to_string(),
                CachedEndpoint {
                    url: url.clone(),
                    resolved_at: Instant::now(),
                    ttl: self.ttl,
                },
            );
        }

        Ok(url)
    }

    async fn resolve_uncached(&self, domain: &str) -> Result<String, AppError> {
        // Tier 1: SRV record
        if let Some((target, port)) = self.srv.lookup(domain).await {
            let candidate = format!("{}://{}:{}", self.scheme, target, port);
            if let Some(url) = normalize_endpoint(&candidate) {
                tracing::debug!(domain = %domain, url = %url, "Resolved via SRV record");
                return Ok(url);
            }
            tracing::debug!(domain = %domain, candidate = %candidate, "SRV target unusable");
        }

        // Tier 2: well-known discovery document
        if let Some(url) = self.fetch_well_known(domain).await {
            tracing::debug!(domain = %domain, url = %url, "Resolved via well-known document");
            return Ok(url);
        }

        // Tier 3: deterministic fallback host
        let fallback = format!("{}://{}.{}", self.scheme, FALLBACK_HOST_PREFIX, domain);
        normalize_endpoint(&fallback).ok_or_else(|| {
            tracing::warn!(domain = %domain, "All discovery tiers failed");
            AppError::DiscoveryFailed(domain.to_string())
        })
    }

    async fn fetch_well_known(&self, domain: &str) -> Option<String> {
        let url = format!("{}://{}{}", self.scheme, domain, WELL_KNOWN_PATH);

        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "Well-known fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(domain = %domain, status = %response.status(), "Well-known fetch rejected");
            return None;
        }

        let document: DiscoveryDocument = match response.json().await {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "Well-known document malformed");
                return None;
            }
        };

        normalize_endpoint(&document.server_url)
    }

    /// Drop a cached resolution, forcing the next resolve to re-run
    ///
    /// Called by the delivery engine when a cached endpoint fails.
    pub async fn invalidate(&self, domain: &str) {
        let mut cache = self.cache.write().await;
        if cache.remove(domain).is_some() {
            tracing::debug!(domain = %domain, "Invalidated cached endpoint");
        }
    }

    /// Clear all cached resolutions
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let total = cache.len();
        let valid = cache.values().filter(|v| v.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }

    /// Prune expired entries
    ///
    /// Should be called periodically to keep the map bounded.
    pub async fn prune_expired(&self) {
        use crate::metrics::DISCOVERY_CACHE_SIZE;

        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, v| v.is_valid());
        let removed = before - cache.len();

        DISCOVERY_CACHE_SIZE
            .with_label_values(&["valid"])
            .set(cache.len() as i64);

        if removed > 0 {
            tracing::info!(removed, "Pruned expired endpoint cache entries");
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}
