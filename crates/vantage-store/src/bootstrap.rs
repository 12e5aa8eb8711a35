//! Startup wiring of the filter store and its two adapters.

use std::sync::Arc;
use tracing::info;

use vantage_core::{query_string, FilterConfiguration};

use crate::location::{Location, UrlAdapter};
use crate::storage::{KeyValueStorage, StorageAdapter};
use crate::store::FilterStore;

/// Initial configuration: defaults, then storage, then URL.
///
/// Both sources are applied field by field, so a link that only names a
/// model still picks up the reader's stored region. A link that names a
/// range brings its own custom bounds.
pub fn initial_configuration(storage: &StorageAdapter, url: &UrlAdapter) -> FilterConfiguration {
    let mut config = FilterConfiguration::default();
    if let Some(stored) = storage.load() {
        config = stored.apply_to(config);
    }
    let from_url = url.read();
    if !from_url.is_empty() {
        config = from_url.apply_to(config);
    }
    config
}

/// Build a store seeded from `storage` and `location`, with both adapters
/// registered.
///
/// The adapters run once before this returns, so storage holds the merged
/// configuration and the URL is in canonical minimal form from the start.
pub fn bootstrap(storage: Arc<dyn KeyValueStorage>, location: Arc<dyn Location>) -> FilterStore {
    let storage_adapter = StorageAdapter::new(storage);
    let url_adapter = UrlAdapter::new(location.clone());

    let initial = initial_configuration(&storage_adapter, &url_adapter);
    info!(
        subsystem = "store",
        op = "bootstrap",
        query = %query_string(&initial),
        "Filter store initialized"
    );

    let store = FilterStore::new(initial).with_location(location);
    store.register_sync_target(Arc::new(storage_adapter));
    store.register_sync_target(Arc::new(url_adapter));
    store.resync();
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MemoryLocation;
    use crate::storage::{MemoryStorage, UnavailableStorage};
    use vantage_core::defaults::FILTERS_STORAGE_KEY;

    #[test]
    fn test_url_overrides_storage() {
        let storage = Arc::new(MemoryStorage::with_item(
            FILTERS_STORAGE_KEY,
            r#"{"model":"GPT-4o","region":"EU"}"#,
        ));
        let location = Arc::new(MemoryLocation::new("http://localhost/?model=Claude"));

        let store = bootstrap(storage, location);
        let snap = store.snapshot();
        assert_eq!(snap.model, "Claude");
        assert_eq!(snap.region, "EU");
    }

    #[test]
    fn test_defaults_when_nothing_stored() {
        let store = bootstrap(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryLocation::new("http://localhost/")),
        );
        assert_eq!(store.snapshot(), FilterConfiguration::default());
    }

    #[test]
    fn test_unavailable_storage_falls_back_to_url() {
        let store = bootstrap(
            Arc::new(UnavailableStorage),
            Arc::new(MemoryLocation::new("http://localhost/?range=30d")),
        );
        assert_eq!(store.query_string(), "range=30d");
    }

    #[test]
    fn test_bootstrap_canonicalizes_url_and_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let location = Arc::new(MemoryLocation::new(
            "http://localhost/?region=EU&range=24h&junk=1",
        ));
        let _store = bootstrap(storage.clone(), location.clone());

        assert_eq!(location.query(), "range=24h&region=EU");
        let raw = storage.get_item(FILTERS_STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""timeRange":"24h""#));
    }
}
