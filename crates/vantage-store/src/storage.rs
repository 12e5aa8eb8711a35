//! Durable client storage for the filter configuration.
//!
//! The whole configuration (not the minimal query form) is written as JSON to
//! one slot, [`FILTERS_STORAGE_KEY`], after every store transition:
//!
//! ```json
//! {"timeRange":"custom","from":"2024-02-01","model":"GPT-4o","region":"Region",
//!  "advanced":{"sentiment":"all","hideBots":false,"verifiedOnly":false}}
//! ```
//!
//! Reading is lenient field by field. A missing slot, unparsable JSON or an
//! unavailable backend all read as "nothing stored"; a single bad field is
//! skipped while the others still apply.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use vantage_core::defaults::FILTERS_STORAGE_KEY;
use vantage_core::query::DATE_FORMAT;
use vantage_core::{
    AdvancedFilters, Error, FilterConfiguration, FilterOverlay, Result, TimeRange,
};

use crate::store::SyncTarget;

// =============================================================================
// KEY-VALUE BACKENDS
// =============================================================================

/// Durable string slots, in the manner of a browser's local storage.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-process storage. Survives store rebuilds, not process restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one slot.
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::default();
        storage
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        storage
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}

/// Storage with no persistent context; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStorage;

impl KeyValueStorage for UnavailableStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("no persistent storage available".to_string()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("no persistent storage available".to_string()))
    }

    fn remove_item(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("no persistent storage available".to_string()))
    }
}

/// All slots kept as one JSON object in a file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, slots: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(slots)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt file is replaced rather than blocking every later write.
        let mut slots = self.read_all().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Discarding unreadable storage file");
            BTreeMap::new()
        });
        slots.insert(key.to_string(), value.to_string());
        self.write_all(&slots)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slots = self.read_all()?;
        if slots.remove(key).is_some() {
            self.write_all(&slots)?;
        }
        Ok(())
    }
}

// =============================================================================
// STORED LAYOUT
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredFilters<'a> {
    time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    model: &'a str,
    region: &'a str,
    advanced: AdvancedFilters,
}

impl<'a> From<&'a FilterConfiguration> for StoredFilters<'a> {
    fn from(config: &'a FilterConfiguration) -> Self {
        Self {
            time_range: config.time_range,
            from: config.custom_from.map(|d| d.format(DATE_FORMAT).to_string()),
            to: config.custom_to.map(|d| d.format(DATE_FORMAT).to_string()),
            model: &config.model,
            region: &config.region,
            advanced: config.advanced,
        }
    }
}

/// Serialize the full configuration in the stored layout.
pub fn to_stored_json(config: &FilterConfiguration) -> Result<String> {
    Ok(serde_json::to_string(&StoredFilters::from(config))?)
}

/// Read the stored layout into an overlay, skipping malformed fields.
///
/// Returns `None` when `raw` is not a JSON object at all.
pub fn overlay_from_stored_json(raw: &str) -> Option<FilterOverlay> {
    let value: JsonValue = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Stored filters are not valid JSON, ignoring");
            return None;
        }
    };
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            warn!("Stored filters are not a JSON object, ignoring");
            return None;
        }
    };

    let str_field = |name: &str| obj.get(name).and_then(JsonValue::as_str);
    let date_field = |name: &str| {
        str_field(name).and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
    };

    let mut overlay = FilterOverlay {
        time_range: str_field("timeRange").and_then(|s| s.parse().ok()),
        custom_from: date_field("from"),
        custom_to: date_field("to"),
        model: str_field("model").map(str::to_string),
        region: str_field("region").map(str::to_string),
        ..FilterOverlay::default()
    };

    if let Some(advanced) = obj.get("advanced").and_then(JsonValue::as_object) {
        overlay.advanced.sentiment = advanced
            .get("sentiment")
            .and_then(JsonValue::as_str)
            .and_then(|s| s.parse().ok());
        overlay.advanced.hide_bots = advanced.get("hideBots").and_then(JsonValue::as_bool);
        overlay.advanced.verified_only = advanced.get("verifiedOnly").and_then(JsonValue::as_bool);
    }

    Some(overlay)
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Keeps one storage slot in step with the filter store.
pub struct StorageAdapter {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl StorageAdapter {
    /// Adapter writing to [`FILTERS_STORAGE_KEY`].
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_key(storage, FILTERS_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored filters, or `None` if nothing usable is stored.
    pub fn load(&self) -> Option<FilterOverlay> {
        match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => overlay_from_stored_json(&raw),
            Ok(None) => {
                debug!(storage_key = %self.key, "No stored filters");
                None
            }
            Err(e) => {
                warn!(storage_key = %self.key, error = %e, "Failed to read stored filters, using defaults");
                None
            }
        }
    }

    /// Write the full configuration to the slot.
    pub fn save(&self, config: &FilterConfiguration) -> Result<()> {
        let json = to_stored_json(config)?;
        self.storage.set_item(&self.key, &json)
    }

    /// Drop the slot entirely.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(&self.key)
    }
}

impl SyncTarget for StorageAdapter {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn on_change(&self, config: &FilterConfiguration) {
        if let Err(e) = self.save(config) {
            warn!(
                subsystem = "sync",
                component = "storage_adapter",
                storage_key = %self.key,
                error = %e,
                "Failed to persist filters"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::{AdvancedFiltersPatch, SentimentFilter};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_stored_layout() {
        let config = FilterConfiguration::default()
            .with_custom_range(Some(date("2024-02-01")), None)
            .with_model("GPT-4o");
        let value: JsonValue = serde_json::from_str(&to_stored_json(&config).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "timeRange": "custom",
                "from": "2024-02-01",
                "model": "GPT-4o",
                "region": "Region",
                "advanced": {"sentiment": "all", "hideBots": false, "verifiedOnly": false}
            })
        );
    }

    #[test]
    fn test_stored_round_trip_is_lossless() {
        let config = FilterConfiguration::default()
            .with_custom_range(Some(date("2024-03-10")), Some(date("2024-03-01")))
            .with_model("All models")
            .with_region("EU")
            .with_advanced(
                AdvancedFiltersPatch::new()
                    .sentiment(SentimentFilter::Neutral)
                    .verified_only(true),
            );
        let overlay = overlay_from_stored_json(&to_stored_json(&config).unwrap()).unwrap();
        assert_eq!(overlay.apply_to(FilterConfiguration::default()), config);
    }

    #[test]
    fn test_corrupt_json_reads_as_nothing() {
        assert!(overlay_from_stored_json("{not json").is_none());
        assert!(overlay_from_stored_json("[1,2,3]").is_none());
        assert!(overlay_from_stored_json("null").is_none());
    }

    #[test]
    fn test_bad_fields_are_skipped_individually() {
        let overlay = overlay_from_stored_json(
            r#"{"timeRange":"90d","model":"Claude","region":42,"advanced":{"sentiment":"angry","hideBots":true}}"#,
        )
        .unwrap();
        assert_eq!(overlay.time_range, None);
        assert_eq!(overlay.model.as_deref(), Some("Claude"));
        assert_eq!(overlay.region, None);
        assert_eq!(overlay.advanced.sentiment, None);
        assert_eq!(overlay.advanced.hide_bots, Some(true));
    }

    #[test]
    fn test_partial_object_from_older_layout() {
        let overlay = overlay_from_stored_json(r#"{"model":"GPT-4o"}"#).unwrap();
        let config = overlay.apply_to(FilterConfiguration::default());
        assert_eq!(config.model, "GPT-4o");
        assert_eq!(config.time_range, TimeRange::Last7Days);
    }

    #[test]
    fn test_adapter_save_and_load() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = StorageAdapter::new(storage.clone());
        assert!(adapter.load().is_none());

        adapter.on_change(&FilterConfiguration::default().with_region("LATAM"));
        let raw = storage.get_item(FILTERS_STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""region":"LATAM""#));
        assert_eq!(adapter.load().unwrap().region.as_deref(), Some("LATAM"));

        adapter.clear().unwrap();
        assert!(adapter.load().is_none());
    }

    #[test]
    fn test_unavailable_storage_never_panics() {
        let adapter = StorageAdapter::new(Arc::new(UnavailableStorage));
        assert!(adapter.load().is_none());
        adapter.on_change(&FilterConfiguration::default());
        assert!(adapter.save(&FilterConfiguration::default()).is_err());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let first = FileStorage::new(&path);
        assert_eq!(first.get_item("a").unwrap(), None);
        first.set_item("a", "1").unwrap();
        first.set_item("b", "2").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(second.get_item("a").unwrap().as_deref(), Some("1"));
        second.remove_item("a").unwrap();
        assert_eq!(first.get_item("a").unwrap(), None);
        assert_eq!(first.get_item("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_storage_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.get_item("a").is_err());
        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
    }
}
