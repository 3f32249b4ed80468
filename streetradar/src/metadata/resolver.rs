//! Single-flight, per-provider metadata cache.

use super::{MetadataError, TileJsonMetadata};
use crate::provider::{AsyncHttpClient, ProviderKind, ProviderSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type MetadataResult = Result<Arc<TileJsonMetadata>, MetadataError>;

/// Statistics for monitoring cache and coalescing effectiveness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverStats {
    /// Total `get_metadata` calls that reached the cache
    pub total_requests: u64,
    /// Calls that waited on another caller's fetch
    pub coalesced_requests: u64,
    /// Calls that issued an HTTP request
    pub network_fetches: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
}

impl ResolverStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct InFlight {
    id: u64,
    sender: broadcast::Sender<MetadataResult>,
}

#[derive(Default)]
struct ResolverState {
    cache: HashMap<ProviderKind, Arc<TileJsonMetadata>>,
    in_flight: HashMap<ProviderKind, InFlight>,
    next_fetch_id: u64,
    stats: ResolverStats,
}

enum Role<'a> {
    Cached(Arc<TileJsonMetadata>),
    Waiter(broadcast::Receiver<MetadataResult>),
    Leader(FetchGuard<'a>),
}

/// Fetches and caches TileJSON descriptors, one in-flight request per provider.
///
/// The state lock is a `parking_lot::Mutex` that is never held across an
/// `.await`; waiters park on a broadcast channel instead.
pub struct MetadataResolver<C> {
    client: Arc<C>,
    state: Mutex<ResolverState>,
}

impl<C: AsyncHttpClient> MetadataResolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Returns the provider's metadata, fetching it if needed.
    ///
    /// Concurrent callers for the same provider share one HTTP request.
    /// Failures are not cached, so the next call retries.
    pub async fn get_metadata(&self, spec: &ProviderSpec) -> MetadataResult {
        let url = spec
            .metadata_url
            .as_deref()
            .ok_or(MetadataError::NoEndpoint(spec.kind))?;

        match self.register(spec.kind) {
            Role::Cached(meta) => Ok(meta),
            Role::Waiter(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => {
                    debug!(provider = %spec.kind, "Metadata leader dropped before completing");
                    Err(MetadataError::Abandoned(spec.kind))
                }
            },
            Role::Leader(guard) => {
                let result = self.fetch(spec.kind, url).await;
                guard.finish(result.clone());
                result
            }
        }
    }

    fn register(&self, kind: ProviderKind) -> Role<'_> {
        let mut state = self.state.lock();
        state.stats.total_requests += 1;

        if let Some(meta) = state.cache.get(&kind).cloned() {
            state.stats.cache_hits += 1;
            return Role::Cached(meta);
        }

        if let Some(flight) = state.in_flight.get(&kind) {
            let rx = flight.sender.subscribe();
            state.stats.coalesced_requests += 1;
            debug!(
                provider = %kind,
                coalesced = state.stats.coalesced_requests,
                "Coalescing metadata request onto in-flight fetch"
            );
            return Role::Waiter(rx);
        }

        // One message per fetch, so capacity 1 never lags
        let (sender, _rx) = broadcast::channel(1);
        let id = state.next_fetch_id;
        state.next_fetch_id += 1;
        state.in_flight.insert(
            kind,
            InFlight {
                id,
                sender: sender.clone(),
            },
        );
        state.stats.network_fetches += 1;
        debug!(provider = %kind, fetch_id = id, "Starting metadata fetch");

        Role::Leader(FetchGuard {
            state: &self.state,
            kind,
            id,
            sender: Some(sender),
        })
    }

    async fn fetch(&self, kind: ProviderKind, url: &str) -> MetadataResult {
        let response = self
            .client
            .get_with_headers(url, &[("Accept", "application/json")])
            .await
            .map_err(|e| MetadataError::Fetch {
                provider: kind,
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            warn!(provider = %kind, url = url, status = response.status, "Metadata request failed");
            return Err(MetadataError::Fetch {
                provider: kind,
                reason: format!("HTTP {} from {}", response.status, url),
            });
        }

        let meta = TileJsonMetadata::from_json(kind, &response.body)?;
        debug!(
            provider = %kind,
            min_zoom = meta.min_zoom,
            max_zoom = meta.max_zoom,
            "Metadata resolved"
        );
        Ok(Arc::new(meta))
    }

    /// Cached metadata for a provider, without touching the network.
    pub fn cached(&self, kind: ProviderKind) -> Option<Arc<TileJsonMetadata>> {
        self.state.lock().cache.get(&kind).cloned()
    }

    /// Drops the cached value and in-flight marker for a provider.
    ///
    /// A fetch already running keeps serving its current waiters but will
    /// not write its result into the cache.
    pub fn clear_cache(&self, kind: ProviderKind) {
        let mut state = self.state.lock();
        let had_value = state.cache.remove(&kind).is_some();
        let had_flight = state.in_flight.remove(&kind).is_some();
        debug!(provider = %kind, had_value, had_flight, "Metadata cache cleared");
    }

    /// Returns the number of providers with a fetch in flight.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> ResolverStats {
        self.state.lock().stats.clone()
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let state = self.state.lock();
        let stats = &state.stats;
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            network_fetches = stats.network_fetches,
            cache_hits = stats.cache_hits,
            cached_providers = state.cache.len(),
            in_flight = state.in_flight.len(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Metadata resolver statistics"
        );
    }
}

/// Owned by the caller leading a fetch.
///
/// Dropping it without calling [`FetchGuard::finish`] (the leading task was
/// cancelled) removes the in-flight marker and closes the channel, so
/// waiters observe [`MetadataError::Abandoned`] instead of hanging.
struct FetchGuard<'a> {
    state: &'a Mutex<ResolverState>,
    kind: ProviderKind,
    id: u64,
    sender: Option<broadcast::Sender<MetadataResult>>,
}

impl FetchGuard<'_> {
    fn finish(mut self, result: MetadataResult) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        {
            let mut state = self.state.lock();
            // A clear_cache since registration removed or replaced our marker
            let current = state
                .in_flight
                .get(&self.kind)
                .is_some_and(|flight| flight.id == self.id);
            if current {
                state.in_flight.remove(&self.kind);
                if let Ok(meta) = &result {
                    state.cache.insert(self.kind, Arc::clone(meta));
                }
            } else {
                debug!(provider = %self.kind, fetch_id = self.id, "Discarding stale metadata fetch");
            }
        }

        let waiters = sender.receiver_count();
        let _ = sender.send(result);
        if waiters > 0 {
            debug!(provider = %self.kind, waiters, "Broadcast metadata to coalesced waiters");
        }
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.sender.is_none() {
            return;
        }
        let mut state = self.state.lock();
        if state
            .in_flight
            .get(&self.kind)
            .is_some_and(|flight| flight.id == self.id)
        {
            state.in_flight.remove(&self.kind);
        }
        warn!(provider = %self.kind, fetch_id = self.id, "Metadata fetch abandoned");
    }
}
