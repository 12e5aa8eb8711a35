//! End-to-end scenarios for the store and both sync adapters.

use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

use vantage_core::defaults::FILTERS_STORAGE_KEY;
use vantage_core::{query_string, AdvancedFiltersPatch, FilterConfiguration, TimeRange};
use vantage_store::{
    bootstrap, FileStorage, FilterStore, KeyValueStorage, Location, MemoryLocation,
    MemoryStorage, SyncTarget,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn fresh() -> (FilterStore, Arc<MemoryStorage>, Arc<MemoryLocation>) {
    let storage = Arc::new(MemoryStorage::new());
    let location = Arc::new(MemoryLocation::new("http://localhost/"));
    let store = bootstrap(storage.clone(), location.clone());
    (store, storage, location)
}

fn stored_json(storage: &MemoryStorage) -> serde_json::Value {
    let raw = storage.get_item(FILTERS_STORAGE_KEY).unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_set_model_updates_url_and_storage() {
    let (store, storage, location) = fresh();
    store.set_model("GPT-4o");

    assert_eq!(store.query_string(), "range=7d&model=GPT-4o");
    assert_eq!(location.query(), "range=7d&model=GPT-4o");
    assert_eq!(stored_json(&storage)["model"], "GPT-4o");
}

#[test]
fn test_hide_bots_scenario() {
    let (store, storage, location) = fresh();
    store.set_advanced(AdvancedFiltersPatch::new().hide_bots(true));

    assert_eq!(location.query(), "range=7d&hideBots=1");
    assert_eq!(stored_json(&storage)["advanced"]["hideBots"], true);
}

#[test]
fn test_open_ended_custom_range_scenario() {
    let (store, storage, location) = fresh();
    store.set_custom_range(Some(date("2024-02-01")), None);

    assert_eq!(location.query(), "range=custom&from=2024-02-01");
    let stored = stored_json(&storage);
    assert_eq!(stored["from"], "2024-02-01");
    assert!(stored.get("to").is_none());
}

#[test]
fn test_filter_changes_do_not_grow_history() {
    let (store, _storage, location) = fresh();
    for range in TimeRange::ALL {
        store.set_time_range(range);
    }
    store.set_region("EU");
    assert_eq!(location.history_len(), 1);
}

/// Checks, at notification time, that earlier targets already ran.
struct ConsistencyWatcher {
    storage: Arc<MemoryStorage>,
    location: Arc<MemoryLocation>,
    mismatches: Mutex<Vec<String>>,
}

impl SyncTarget for ConsistencyWatcher {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn on_change(&self, config: &FilterConfiguration) {
        if self.location.query() != query_string(config) {
            self.mismatches
                .lock()
                .unwrap()
                .push(format!("url: {}", self.location.query()));
        }
        let raw = self.storage.get_item(FILTERS_STORAGE_KEY).unwrap().unwrap_or_default();
        if !raw.contains(&format!(r#""model":"{}""#, config.model)) {
            self.mismatches.lock().unwrap().push(format!("storage: {}", raw));
        }
    }
}

#[test]
fn test_adapters_are_consistent_before_setter_returns() {
    let (store, storage, location) = fresh();
    let watcher = Arc::new(ConsistencyWatcher {
        storage: storage.clone(),
        location: location.clone(),
        mismatches: Mutex::new(Vec::new()),
    });
    store.register_sync_target(watcher.clone());
    assert_eq!(store.sync_target_names(), vec!["storage", "url", "watcher"]);

    let mut rx = store.subscribe();
    store.set_model("Claude");
    store.set_time_range(TimeRange::Last24Hours);

    assert!(watcher.mismatches.lock().unwrap().is_empty());
    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(query_string(&seen), location.query());
}

#[test]
fn test_back_navigation_resync() {
    let (store, _storage, location) = fresh();
    store.set_time_range(TimeRange::Last30Days);
    assert_eq!(location.query(), "range=30d");

    // An external navigation lands on a shared link, then the user goes back.
    location.navigate("http://localhost/?range=24h&sentiment=negative");
    store.init_from_url();
    assert_eq!(store.snapshot().time_range, TimeRange::Last24Hours);

    assert!(location.back());
    store.init_from_url();
    // The older entry is restored as written, without the link's sentiment.
    assert_eq!(store.query_string(), "range=30d");
    assert_eq!(location.query(), "range=30d");
}

#[test]
fn test_back_and_forward_keep_history_entries_intact() {
    let storage = Arc::new(MemoryStorage::new());
    let location = Arc::new(MemoryLocation::new("http://localhost/?range=7d"));
    let store = bootstrap(storage, location.clone());

    location.navigate("http://localhost/?range=30d&model=Claude");
    store.init_from_url();
    assert_eq!(store.query_string(), "range=30d&model=Claude");

    assert!(location.back());
    assert_eq!(location.query(), "range=7d");
    store.init_from_url();
    assert_eq!(store.query_string(), "range=7d");
    assert_eq!(store.snapshot().model, "All models");
    // The URL adapter must not rewrite the entry the user went back to.
    assert_eq!(location.query(), "range=7d");

    assert!(location.forward());
    store.init_from_url();
    assert_eq!(store.query_string(), "range=30d&model=Claude");
    assert_eq!(location.query(), "range=30d&model=Claude");
    assert_eq!(location.history_len(), 2);
}

#[test]
fn test_reload_restores_from_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = bootstrap(
            Arc::new(FileStorage::new(&path)),
            Arc::new(MemoryLocation::new("http://localhost/")),
        );
        store.set_custom_range(Some(date("2024-01-01")), Some(date("2024-01-31")));
        store.set_model("Perplexity");
    }

    // A fresh page load with a clean URL picks the stored state back up.
    let location = Arc::new(MemoryLocation::new("http://localhost/"));
    let store = bootstrap(Arc::new(FileStorage::new(&path)), location.clone());
    assert_eq!(
        store.query_string(),
        "range=custom&from=2024-01-01&to=2024-01-31&model=Perplexity"
    );
    assert_eq!(location.query(), store.query_string());
}

#[test]
fn test_shared_link_brings_its_own_range() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set_item(
            FILTERS_STORAGE_KEY,
            r#"{"timeRange":"custom","from":"2023-01-01","to":"2023-12-31","region":"EU"}"#,
        )
        .unwrap();
    let location = Arc::new(MemoryLocation::new("http://localhost/?range=custom&from=2024-02-01"));

    let store = bootstrap(storage, location);
    let snap = store.snapshot();
    assert_eq!(snap.custom_from, Some(date("2024-02-01")));
    assert_eq!(snap.custom_to, None);
    assert_eq!(snap.region, "EU");
}
