//! Deduplicating stale-while-revalidate query cache.
//!
//! Every entry keeps its last good value while a revalidation is in flight,
//! so views never flash empty on a filter change. Concurrent requests for one
//! key share a single fetch.
//!
//! Each fetch is stamped with the entry's `request_version`. A response is
//! applied only if the version still matches when it arrives; a forced
//! refresh or a local [`QueryCache::mutate`] bumps the version and turns any
//! older in-flight response into a no-op. Versions come from one counter
//! shared by the whole cache, so a key that is evicted and fetched again
//! never reuses a version still held by an older request.

use lru::LruCache;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use vantage_core::defaults::{CACHE_CAPACITY, CACHE_EVENT_CAPACITY, DEDUPE_INTERVAL_MS};
use vantage_core::{Error, Result};

use crate::fetcher::Fetcher;

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of keys kept before LRU eviction.
    pub capacity: NonZeroUsize,
    /// Revalidation within this window after a successful fetch is skipped.
    pub dedupe_interval: Duration,
    /// Buffer of the change notification channel.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            dedupe_interval: Duration::from_millis(DEDUPE_INTERVAL_MS),
            event_capacity: CACHE_EVENT_CAPACITY,
        }
    }
}

/// What a view sees for one key.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// Last successfully fetched (or mutated) value.
    pub data: Option<Arc<JsonValue>>,
    /// Error of the latest settled request, if it failed.
    pub error: Option<Arc<Error>>,
    /// A request for this key is in flight.
    pub is_loading: bool,
    /// `data` belongs to the subscription's previous key.
    pub is_previous: bool,
}

impl QueryState {
    /// Deserialize `data` into a view model.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<Result<T>> {
        self.data
            .as_ref()
            .map(|v| T::deserialize(v.as_ref()).map_err(Error::from))
    }

    /// Loading with nothing to show yet.
    pub fn is_empty_loading(&self) -> bool {
        self.is_loading && self.data.is_none()
    }
}

/// Kind of change published on the cache event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Loading,
    Resolved,
    Failed,
    Mutated,
    Removed,
}

/// Notification that the entry for `key` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: String,
    pub kind: CacheEventKind,
}

/// Result of asking for a revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// A new fetch was started with this version.
    Started { version: u64 },
    /// A fetch for the key was already in flight; the caller shares it.
    Joined,
    /// The data is fresh within the dedupe interval; nothing was fetched.
    Fresh,
}

#[derive(Debug, Default)]
struct CacheEntry {
    data: Option<Arc<JsonValue>>,
    error: Option<Arc<Error>>,
    in_flight: bool,
    request_version: u64,
    fetched_at: Option<Instant>,
}

impl CacheEntry {
    fn state(&self) -> QueryState {
        QueryState {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight,
            is_previous: false,
        }
    }
}

/// Shared query cache. Cloning is cheap and shares the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    entries: Mutex<LruCache<String, CacheEntry>>,
    next_version: AtomicU64,
    fetcher: Arc<dyn Fetcher>,
    events: broadcast::Sender<CacheEvent>,
    config: CacheConfig,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(fetcher, CacheConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn Fetcher>, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(QueryCacheInner {
                entries: Mutex::new(LruCache::new(config.capacity)),
                next_version: AtomicU64::new(1),
                fetcher,
                events,
                config,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_version(&self) -> u64 {
        self.inner.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(&self, key: &str, kind: CacheEventKind) {
        let _ = self.inner.events.send(CacheEvent {
            key: key.to_string(),
            kind,
        });
    }

    /// Receive a [`CacheEvent`] for every entry change.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Current state for `key`. Unknown keys read as empty and idle.
    pub fn read(&self, key: &str) -> QueryState {
        self.entries()
            .get(key)
            .map(CacheEntry::state)
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Fetch `key` unless a fetch is already running or the data is fresh.
    ///
    /// Must be called from within a tokio runtime; the fetch runs on a
    /// spawned task.
    pub fn revalidate(&self, key: &str) -> Revalidation {
        self.start(key, false)
    }

    /// Fetch `key` now, superseding any request already in flight.
    pub fn refresh(&self, key: &str) -> Revalidation {
        self.start(key, true)
    }

    fn start(&self, key: &str, force: bool) -> Revalidation {
        let version = {
            let mut entries = self.entries();
            let entry = entries.get_or_insert_mut(key.to_string(), CacheEntry::default);

            if !force {
                if entry.in_flight {
                    debug!(subsystem = "query", cache_key = key, "Joining in-flight request");
                    return Revalidation::Joined;
                }
                let fresh = entry.error.is_none()
                    && entry
                        .fetched_at
                        .is_some_and(|at| at.elapsed() < self.inner.config.dedupe_interval);
                if fresh {
                    debug!(subsystem = "query", cache_key = key, "Within dedupe interval");
                    return Revalidation::Fresh;
                }
            }

            entry.request_version = self.next_version();
            entry.in_flight = true;
            entry.request_version
        };

        debug!(
            subsystem = "query",
            op = "revalidate",
            cache_key = key,
            request_version = version,
            "Starting fetch"
        );
        self.emit(key, CacheEventKind::Loading);

        let cache = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let result = cache.inner.fetcher.fetch(&key).await;
            cache.settle(&key, version, result);
        });

        Revalidation::Started { version }
    }

    fn settle(&self, key: &str, version: u64, result: Result<JsonValue>) {
        let kind = {
            let mut entries = self.entries();
            let Some(entry) = entries.peek_mut(key) else {
                debug!(subsystem = "query", cache_key = key, "Entry evicted before response");
                return;
            };
            if entry.request_version != version {
                debug!(
                    subsystem = "query",
                    cache_key = key,
                    request_version = version,
                    current_version = entry.request_version,
                    "Discarding superseded response"
                );
                return;
            }

            entry.in_flight = false;
            match result {
                Ok(value) => {
                    entry.data = Some(Arc::new(value));
                    entry.error = None;
                    entry.fetched_at = Some(Instant::now());
                    CacheEventKind::Resolved
                }
                Err(e) => {
                    warn!(
                        subsystem = "query",
                        cache_key = key,
                        error = %e,
                        transient = e.is_transient(),
                        kept_stale = entry.data.is_some(),
                        "Fetch failed"
                    );
                    entry.error = Some(Arc::new(e));
                    CacheEventKind::Failed
                }
            }
        };
        self.emit(key, kind);
    }

    /// Overwrite the value for `key` locally.
    ///
    /// Any request in flight for the key is superseded. With `revalidate`
    /// a fresh fetch is started afterwards to confirm the value.
    pub fn mutate(&self, key: &str, value: JsonValue, revalidate: bool) {
        {
            let mut entries = self.entries();
            let entry = entries.get_or_insert_mut(key.to_string(), CacheEntry::default);
            entry.request_version = self.next_version();
            entry.in_flight = false;
            entry.data = Some(Arc::new(value));
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
        }
        debug!(subsystem = "query", op = "mutate", cache_key = key, "Local mutation");
        self.emit(key, CacheEventKind::Mutated);

        if revalidate {
            self.refresh(key);
        }
    }

    /// Mark `key` stale so the next revalidation fetches even inside the
    /// dedupe interval. Cached data stays readable.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.entries().peek_mut(key) {
            Some(entry) => {
                entry.fetched_at = None;
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `key`. A response still in flight is discarded.
    pub fn remove(&self, key: &str) {
        if self.entries().pop(key).is_some() {
            self.emit(key, CacheEventKind::Removed);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let keys: Vec<String> = {
            let mut entries = self.entries();
            let keys = entries.iter().map(|(k, _)| k.clone()).collect();
            entries.clear();
            keys
        };
        debug!(subsystem = "query", entry_count = keys.len(), "Cache cleared");
        for key in keys {
            self.emit(&key, CacheEventKind::Removed);
        }
    }

    /// Revalidate `key` and wait until it is no longer loading.
    pub async fn fetch(&self, key: &str) -> QueryState {
        let mut events = self.subscribe();
        self.revalidate(key);
        self.settled(key, &mut events).await
    }

    /// Wait until `key` is no longer loading.
    pub async fn wait_settled(&self, key: &str) -> QueryState {
        let mut events = self.subscribe();
        self.settled(key, &mut events).await
    }

    async fn settled(&self, key: &str, events: &mut broadcast::Receiver<CacheEvent>) -> QueryState {
        loop {
            let state = self.read(key);
            if !state.is_loading {
                return state;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.read(key),
            }
        }
    }
}
