//! Per-contract public key cache
//!
//! Keys are fetched on first use and reused until their TTL runs out.
//! Concurrent misses for the same contract share a single fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::engine::{EngineError, KeyMaterial, KeySource};
use crate::error::{ClientError, Result};
use crate::metrics::{self, CACHE_COALESCED, CACHE_HIT, CACHE_MISS, OP_KEY_FETCH};
use crate::retry::RetryPolicy;

/// A contract's public key and its validity window
#[derive(Debug, Clone)]
pub struct PublicKeyRecord {
    contract: String,
    key: KeyMaterial,
    fetched_at: Instant,
    expires_at: Instant,
}

impl PublicKeyRecord {
    fn new(contract: String, key: KeyMaterial, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            contract,
            key,
            fetched_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// A record stays valid up to and including its expiry instant
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

type FetchResult = std::result::Result<Arc<PublicKeyRecord>, EngineError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    records: HashMap<String, Arc<PublicKeyRecord>>,
    in_flight: HashMap<String, InFlight>,
    next_id: u64,
}

pub struct KeyCache {
    state: Arc<Mutex<CacheState>>,
    source: Arc<dyn KeySource>,
    ttl: Duration,
    retry: RetryPolicy,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            source,
            ttl,
            retry,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the key for `contract`, fetching it if absent or expired
    ///
    /// Fetch failures are retried with the cache's policy and then surfaced
    /// as [`ClientError::KeyFetch`]; nothing is stored on failure.
    pub async fn get_key(&self, contract: &str) -> Result<Arc<PublicKeyRecord>> {
        let fetch = {
            let mut state = lock(&self.state);

            if let Some(record) = state.records.get(contract) {
                if !record.is_expired_at(Instant::now()) {
                    metrics::record_key_lookup(CACHE_HIT);
                    return Ok(record.clone());
                }
                state.records.remove(contract);
            }

            match state.in_flight.get(contract) {
                Some(in_flight) => {
                    metrics::record_key_lookup(CACHE_COALESCED);
                    tracing::debug!(contract = %contract, "Joining in-flight key fetch");
                    in_flight.fetch.clone()
                }
                None => {
                    metrics::record_key_lookup(CACHE_MISS);
                    state.next_id += 1;
                    let id = state.next_id;
                    let fetch = self.fetch(contract.to_string(), id).boxed().shared();
                    state.in_flight.insert(
                        contract.to_string(),
                        InFlight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await.map_err(|source| ClientError::KeyFetch {
            contract: contract.to_string(),
            source,
        })
    }

    /// Drop the cached key for `contract`
    ///
    /// A fetch already running for it completes for its waiters but its
    /// result is not stored.
    pub fn invalidate(&self, contract: &str) {
        let mut state = lock(&self.state);
        let had_record = state.records.remove(contract).is_some();
        state.in_flight.remove(contract);
        tracing::debug!(contract = %contract, had_record, "Invalidated public key");
    }

    /// Drop every cached key
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        let count = state.records.len();
        state.records.clear();
        state.in_flight.clear();
        tracing::debug!(count, "Cleared public key cache");
    }

    /// Number of unexpired keys currently held
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.state)
            .records
            .values()
            .filter(|r| !r.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fetch(&self, contract: String, id: u64) -> impl Future<Output = FetchResult> + Send + 'static {
        // the in-flight map owns this future, so it must not own the map
        let state = Arc::downgrade(&self.state);
        let source = self.source.clone();
        let retry = self.retry;
        let ttl = self.ttl;

        async move {
            tracing::debug!(contract = %contract, "Fetching public key");
            let source = &source;
            let name = contract.as_str();
            let result = retry
                .execute(OP_KEY_FETCH, move || async move {
                    let result = source.fetch_public_key(name).await;
                    metrics::record_engine_call(OP_KEY_FETCH, result.is_ok());
                    result
                })
                .await;

            let Some(state) = Weak::upgrade(&state) else {
                return result.map(|key| Arc::new(PublicKeyRecord::new(contract, key, ttl)));
            };
            let mut state = lock(&state);
            let current = state.in_flight.get(&contract).map(|f| f.id) == Some(id);
            if current {
                state.in_flight.remove(&contract);
            }

            let key = match result {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(contract = %contract, error = %err, "Public key fetch failed");
                    return Err(err);
                }
            };

            let record = Arc::new(PublicKeyRecord::new(contract.clone(), key, ttl));

            if current {
                state.records.insert(contract, record.clone());
            } else {
                tracing::debug!(contract = %record.contract, "Discarding key fetched after invalidation");
            }

            Ok(record)
        }
    }
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticKeySource, CONTRACT};

    const OTHER: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    fn cache_with(source: Arc<StaticKeySource>, ttl: Duration) -> KeyCache {
        KeyCache::new(source, ttl, RetryPolicy::new(2, Duration::from_millis(10)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let first = cache.get_key(CONTRACT).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_key(CONTRACT).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_ttl() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 0);

        cache.get_key(CONTRACT).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_per_contract() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        cache.get_key(OTHER).await.unwrap();
        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = Arc::new(StaticKeySource::new().with_delay(Duration::from_millis(50)));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let results =
            futures::future::join_all((0..5).map(|_| cache.get_key(CONTRACT))).await;

        assert_eq!(source.fetches(), 1);
        let records: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        cache.invalidate(CONTRACT);
        assert!(cache.is_empty());

        cache.get_key(CONTRACT).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_everything() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        cache.get_key(OTHER).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());

        cache.get_key(OTHER).await.unwrap();
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_discards_result() {
        let source = Arc::new(StaticKeySource::new().with_delay(Duration::from_millis(50)));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let (fetched, _) = tokio::join!(cache.get_key(CONTRACT), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.invalidate(CONTRACT);
        });

        assert!(fetched.is_ok());
        assert!(cache.is_empty());

        cache.get_key(CONTRACT).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let source = Arc::new(StaticKeySource::new().failing(1));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_key_fetch_error_and_caches_nothing() {
        let source = Arc::new(StaticKeySource::new().failing(5));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let err = cache.get_key(CONTRACT).await.unwrap_err();
        match err {
            ClientError::KeyFetch { contract, source } => {
                assert_eq!(contract, CONTRACT);
                assert!(matches!(source, EngineError::Transport(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.fetches(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_of_expired_key_share_one_fetch() {
        let source = Arc::new(StaticKeySource::new().with_delay(Duration::from_millis(50)));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let stale = cache.get_key(CONTRACT).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let results =
            futures::future::join_all((0..5).map(|_| cache.get_key(CONTRACT))).await;

        assert_eq!(source.fetches(), 2);
        let records: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
        assert!(!Arc::ptr_eq(&stale, &records[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_shared_fetch_reaches_every_waiter() {
        let source = Arc::new(
            StaticKeySource::new()
                .with_delay(Duration::from_millis(50))
                .failing(2),
        );
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let results =
            futures::future::join_all((0..4).map(|_| cache.get_key(CONTRACT))).await;

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(ClientError::KeyFetch { .. }))));
        assert_eq!(source.fetches(), 2);
        assert!(cache.is_empty());

        cache.get_key(CONTRACT).await.unwrap();
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_drops_expired_record() {
        let source = Arc::new(StaticKeySource::new());
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        cache.get_key(CONTRACT).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        source.fail_next(2);

        assert!(cache.get_key(CONTRACT).await.is_err());
        assert!(lock(&cache.state).records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_cache_does_not_outlive_abandoned_fetch() {
        let source = Arc::new(StaticKeySource::new().with_delay(Duration::from_millis(50)));
        let cache = cache_with(source.clone(), Duration::from_secs(60));

        let mut pending = Box::pin(cache.get_key(CONTRACT));
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert_eq!(source.fetches(), 1);

        let state = Arc::downgrade(&cache.state);
        drop(pending);
        drop(cache);
        assert!(state.upgrade().is_none());
    }
}
