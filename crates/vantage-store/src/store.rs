//! The global filter store.
//!
//! [`FilterStore`] owns the single mutable [`FilterConfiguration`]. Readers
//! take snapshots or subscribe to a `watch` channel; writers go through the
//! setters, each of which runs one atomic transition:
//!
//! 1. compute the next configuration (custom-range invariant enforced),
//! 2. publish it to every `watch` subscriber,
//! 3. hand it to every registered [`SyncTarget`] (storage, URL, ...),
//!
//! all under one write lock, so two setters never interleave and a subscriber
//! woken by step 2 can rely on step 3 having finished once the setter returns.
//!
//! Sync targets run while the write lock is held. They must not call back
//! into the store.

use chrono::NaiveDate;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, trace};

use vantage_core::{
    query_string, AdvancedFiltersPatch, FilterConfiguration, FilterOverlay, TimeRange,
};

use crate::location::Location;

/// Something that mirrors the filter configuration elsewhere.
///
/// Implementations are infallible from the store's point of view: failures
/// are logged and swallowed so a broken storage slot never blocks a filter
/// change.
pub trait SyncTarget: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Called after every transition with the new configuration.
    fn on_change(&self, config: &FilterConfiguration);
}

/// Shared, observable holder of the global filter configuration.
pub struct FilterStore {
    state: watch::Sender<FilterConfiguration>,
    write_lock: Mutex<()>,
    targets: RwLock<Vec<Arc<dyn SyncTarget>>>,
    url_source: Option<Arc<dyn Location>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(FilterConfiguration::default())
    }
}

impl FilterStore {
    /// Create a store holding `initial` with no sync targets.
    pub fn new(initial: FilterConfiguration) -> Self {
        let (state, _) = watch::channel(initial.normalized());
        Self {
            state,
            write_lock: Mutex::new(()),
            targets: RwLock::new(Vec::new()),
            url_source: None,
        }
    }

    /// Attach the page location [`init_from_url`](Self::init_from_url) reads.
    pub fn with_location(mut self, location: Arc<dyn Location>) -> Self {
        self.url_source = Some(location);
        self
    }

    /// Add a target to the on-change notification list.
    pub fn register_sync_target(&self, target: Arc<dyn SyncTarget>) {
        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        debug!(
            subsystem = "store",
            sync_target = target.name(),
            "Registered sync target"
        );
        targets.push(target);
    }

    /// Names of registered sync targets, in notification order.
    pub fn sync_target_names(&self) -> Vec<&'static str> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.name())
            .collect()
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Current configuration.
    pub fn snapshot(&self) -> FilterConfiguration {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published configuration.
    pub fn subscribe(&self) -> watch::Receiver<FilterConfiguration> {
        self.state.subscribe()
    }

    /// Minimal query string of the current configuration.
    pub fn query_string(&self) -> String {
        query_string(&self.state.borrow())
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Select a time range. Anything other than `custom` clears the custom bounds.
    pub fn set_time_range(&self, range: TimeRange) {
        self.transition("set_time_range", |c| c.with_time_range(range));
    }

    /// Select a custom range. Either bound may be open; order is not checked.
    pub fn set_custom_range(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.transition("set_custom_range", |c| c.with_custom_range(from, to));
    }

    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        self.transition("set_model", |c| c.with_model(model));
    }

    pub fn set_region(&self, region: impl Into<String>) {
        let region = region.into();
        self.transition("set_region", |c| c.with_region(region));
    }

    /// Shallow-merge the given advanced filter fields.
    pub fn set_advanced(&self, patch: AdvancedFiltersPatch) {
        self.transition("set_advanced", |c| c.with_advanced(patch));
    }

    /// Restore every field to its default.
    pub fn reset_all(&self) {
        info!(subsystem = "store", op = "reset_all", "Resetting filters");
        self.transition("reset_all", |_| FilterConfiguration::default());
    }

    /// Restore the configuration encoded in the attached page location.
    ///
    /// Meant for external navigation (back/forward, a followed link) that
    /// changed the URL without going through the setters. The URL is always
    /// written in minimal form, so a key absent from it means that field's
    /// default; the live state is not used as a base. Startup merging with
    /// stored filters is done by [`bootstrap`](crate::bootstrap()).
    pub fn init_from_url(&self) {
        let Some(location) = &self.url_source else {
            debug!(
                subsystem = "store",
                op = "init_from_url",
                "No location attached, skipping"
            );
            return;
        };
        let overlay = FilterOverlay::parse(&location.query());
        self.transition("init_from_url", |_| {
            overlay.apply_to(FilterConfiguration::default())
        });
    }

    /// Push the current configuration to every sync target without changing it.
    pub fn resync(&self) {
        self.transition("resync", |c| c);
    }

    fn transition<F>(&self, op: &'static str, f: F)
    where
        F: FnOnce(FilterConfiguration) -> FilterConfiguration,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let next = f(self.snapshot()).normalized();
        debug!(
            subsystem = "store",
            op,
            query = %query_string(&next),
            "Filter transition"
        );
        self.state.send_replace(next.clone());

        let targets: Vec<Arc<dyn SyncTarget>> = self
            .targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for target in targets {
            trace!(sync_target = target.name(), op, "Notifying sync target");
            target.on_change(&next);
        }
    }
}
