//! Views bound to the filter store.
//!
//! A [`QuerySubscription`] derives its cache key from the current filter
//! configuration, revalidates whenever that key changes and reports the
//! cache state for it. With `keep_previous_data` the last value of the old
//! key stays visible, flagged [`QueryState::is_previous`], until the new key
//! resolves.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use vantage_core::{FilterConfiguration, QueryKey};

use crate::cache::{CacheEvent, QueryCache, QueryState, Revalidation};

/// How a view builds its cache key.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    kind: RequestKind,
}

#[derive(Debug, Clone)]
enum RequestKind {
    /// Path plus the global filters plus view-local parameters.
    Filtered {
        path: String,
        params: Vec<(String, String)>,
    },
    /// Key independent of the filters.
    Fixed(String),
    /// No key; nothing is fetched.
    Disabled,
}

impl QueryRequest {
    /// Key that follows the global filters.
    pub fn filtered(path: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Filtered {
                path: path.into(),
                params: Vec::new(),
            },
        }
    }

    /// Key that ignores the global filters.
    pub fn fixed(key: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Fixed(key.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            kind: RequestKind::Disabled,
        }
    }

    /// Add a view-local parameter after the filter parameters.
    ///
    /// Has no effect on fixed or disabled requests.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let RequestKind::Filtered { params, .. } = &mut self.kind {
            params.push((key.into(), value.to_string()));
        }
        self
    }

    /// Cache key under `config`, or `None` when disabled.
    pub fn key_for(&self, config: &FilterConfiguration) -> Option<String> {
        match &self.kind {
            RequestKind::Filtered { path, params } => {
                let key = params
                    .iter()
                    .fold(QueryKey::new(path.as_str()).with_filters(config), |key, (k, v)| {
                        key.param(k.as_str(), v)
                    });
                Some(key.into_string())
            }
            RequestKind::Fixed(key) => Some(key.clone()),
            RequestKind::Disabled => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    /// Show the previous key's data while the new key loads.
    pub keep_previous_data: bool,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            keep_previous_data: true,
        }
    }
}

/// A live view over one query whose key tracks the filter store.
pub struct QuerySubscription {
    cache: QueryCache,
    filters: watch::Receiver<FilterConfiguration>,
    events: broadcast::Receiver<CacheEvent>,
    request: QueryRequest,
    options: SubscriptionOptions,
    current_key: Option<String>,
    previous: Option<Arc<JsonValue>>,
    filters_closed: bool,
}

impl QuerySubscription {
    /// Mount a view: derive the key from the current filters and revalidate.
    pub fn new(
        cache: QueryCache,
        filters: watch::Receiver<FilterConfiguration>,
        request: QueryRequest,
        options: SubscriptionOptions,
    ) -> Self {
        let events = cache.subscribe();
        let mut subscription = Self {
            cache,
            filters,
            events,
            request,
            options,
            current_key: None,
            previous: None,
            filters_closed: false,
        };
        if let Some(key) = subscription.derive_key() {
            subscription.cache.revalidate(&key);
            subscription.current_key = Some(key);
        }
        subscription
    }

    pub fn key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    fn derive_key(&mut self) -> Option<String> {
        let config = self.filters.borrow_and_update().clone();
        self.request.key_for(&config)
    }

    /// Re-derive the key from the latest filters. Returns whether it changed.
    pub fn sync(&mut self) -> bool {
        let key = self.derive_key();
        if key == self.current_key {
            return false;
        }

        if self.options.keep_previous_data {
            if let Some(old) = self.current_key.as_deref() {
                let carried = self.cache.read(old).data;
                self.previous = carried.or_else(|| self.previous.take());
            }
        } else {
            self.previous = None;
        }

        debug!(
            subsystem = "query",
            component = "subscription",
            from = self.current_key.as_deref().unwrap_or("-"),
            to = key.as_deref().unwrap_or("-"),
            "Query key changed"
        );
        if let Some(k) = key.as_deref() {
            self.cache.revalidate(k);
        }
        self.current_key = key;
        true
    }

    /// State for the current key.
    pub fn state(&self) -> QueryState {
        let Some(key) = self.current_key.as_deref() else {
            return QueryState::default();
        };
        let mut state = self.cache.read(key);
        if state.data.is_none() && self.options.keep_previous_data {
            if let Some(previous) = &self.previous {
                state.data = Some(previous.clone());
                state.is_previous = true;
            }
        }
        state
    }

    /// Wait for the next change relevant to this view and return the new state.
    ///
    /// Wakes on a filter change that alters the key or on any cache event for
    /// the current key. Filter changes are checked first so a queued event
    /// for the old key never wins over a key change. A lagging event receiver
    /// also wakes, since events may have been missed.
    pub async fn changed(&mut self) -> QueryState {
        loop {
            tokio::select! {
                biased;

                res = self.filters.changed(), if !self.filters_closed => {
                    match res {
                        Ok(()) => {
                            if self.sync() {
                                return self.state();
                            }
                        }
                        Err(_) => self.filters_closed = true,
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Ok(event) => {
                            if self.current_key.as_deref() == Some(event.key.as_str()) {
                                return self.state();
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => return self.state(),
                        Err(broadcast::error::RecvError::Closed) => return self.state(),
                    }
                }
            }
        }
    }

    /// Wait until the current key is no longer loading.
    pub async fn settled(&mut self) -> QueryState {
        loop {
            let state = self.state();
            if !state.is_loading {
                return state;
            }
            self.changed().await;
        }
    }

    /// Force a fetch of the current key.
    pub fn refresh(&self) -> Option<Revalidation> {
        self.current_key.as_deref().map(|k| self.cache.refresh(k))
    }

    /// Overwrite the current key's value locally.
    pub fn mutate(&self, value: JsonValue, revalidate: bool) {
        if let Some(key) = self.current_key.as_deref() {
            self.cache.mutate(key, value, revalidate);
        }
    }
}
