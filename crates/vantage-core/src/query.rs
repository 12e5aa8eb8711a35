//! Minimal query-string serialization of the filter configuration.
//!
//! [`FilterParams::from_config`] is the single derivation used for the page
//! URL, for HTTP query parameters, and (through [`crate::key::QueryKey`]) for
//! cache keys. It only materializes fields that differ from their "no filter"
//! value, in a fixed order:
//!
//! | Order | Key | Emitted when |
//! |-------|-----|--------------|
//! | 1 | `range` | always |
//! | 2 | `from` | range is `custom` and a start date is set |
//! | 3 | `to` | range is `custom` and an end date is set |
//! | 4 | `model` | model is not empty and not `"All models"` |
//! | 5 | `region` | region is not empty and not `"Region"` |
//! | 6 | `sentiment` | sentiment is not `all` |
//! | 7 | `hideBots=1` | bots are hidden |
//! | 8 | `verified=1` | verified-only is on |
//!
//! [`FilterOverlay`] goes the other way: it reads whatever recognized keys a
//! query string carries and can be layered over an existing configuration.

use chrono::NaiveDate;
use std::borrow::Cow;
use tracing::{debug, trace};

use crate::filters::{AdvancedFiltersPatch, FilterConfiguration, TimeRange};

pub const RANGE: &str = "range";
pub const FROM: &str = "from";
pub const TO: &str = "to";
pub const MODEL: &str = "model";
pub const REGION: &str = "region";
pub const SENTIMENT: &str = "sentiment";
pub const HIDE_BOTS: &str = "hideBots";
pub const VERIFIED: &str = "verified";

/// Date format for `from`/`to` values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// ENCODING
// =============================================================================

/// Form-encode one component (`application/x-www-form-urlencoded`, space as `+`).
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Decode one form-encoded component. Returns `None` on invalid UTF-8.
pub fn decode_component(value: &str) -> Option<String> {
    let plus_decoded = value.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .ok()
        .map(Cow::into_owned)
}

/// Join key/value pairs into a form-encoded query string (no leading `?`).
pub fn encode_pairs<'a, I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = &'a (K, V)>,
    K: AsRef<str> + 'a,
    V: AsRef<str> + 'a,
{
    pairs
        .into_iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                encode_component(k.as_ref()),
                encode_component(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Split a query string into decoded pairs, in order.
///
/// A leading `?` is accepted. Pairs whose key or value is not valid
/// percent-encoded UTF-8 are dropped; everything else is kept.
pub fn decode_pairs(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
            match (decode_component(raw_key), decode_component(raw_value)) {
                (Some(k), Some(v)) => Some((k, v)),
                _ => {
                    debug!(param = segment, "Dropping undecodable query parameter");
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Ordered, minimal query parameters derived from a [`FilterConfiguration`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterParams {
    pairs: Vec<(&'static str, String)>,
}

impl FilterParams {
    /// Derive the minimal parameter set.
    pub fn from_config(config: &FilterConfiguration) -> Self {
        let mut pairs = Vec::with_capacity(8);
        pairs.push((RANGE, config.time_range.as_str().to_string()));

        if config.time_range == TimeRange::Custom {
            if let Some(from) = config.custom_from {
                pairs.push((FROM, from.format(DATE_FORMAT).to_string()));
            }
            if let Some(to) = config.custom_to {
                pairs.push((TO, to.format(DATE_FORMAT).to_string()));
            }
        }
        if config.has_model_filter() {
            pairs.push((MODEL, config.model.clone()));
        }
        if config.has_region_filter() {
            pairs.push((REGION, config.region.clone()));
        }
        if !config.advanced.sentiment.is_all() {
            pairs.push((SENTIMENT, config.advanced.sentiment.as_str().to_string()));
        }
        if config.advanced.hide_bots {
            pairs.push((HIDE_BOTS, "1".to_string()));
        }
        if config.advanced.verified_only {
            pairs.push((VERIFIED, "1".to_string()));
        }

        Self { pairs }
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Form-encoded query string, e.g. `range=7d&model=GPT-4o`.
    pub fn to_query_string(&self) -> String {
        encode_pairs(&self.pairs)
    }
}

impl std::fmt::Display for FilterParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Shorthand for `FilterParams::from_config(config).to_query_string()`.
pub fn query_string(config: &FilterConfiguration) -> String {
    FilterParams::from_config(config).to_query_string()
}

// =============================================================================
// PARSING
// =============================================================================

/// Recognized filter values read from an external representation.
///
/// Every field is optional: absent or malformed inputs leave the underlying
/// configuration untouched when the overlay is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOverlay {
    pub time_range: Option<TimeRange>,
    pub custom_from: Option<NaiveDate>,
    pub custom_to: Option<NaiveDate>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub advanced: AdvancedFiltersPatch,
}

impl FilterOverlay {
    /// Read recognized keys from a query string.
    ///
    /// Unknown keys are ignored. A recognized key with a malformed value is
    /// ignored on its own; the remaining keys still apply. When a key repeats,
    /// the first occurrence wins.
    pub fn parse(query: &str) -> Self {
        let mut overlay = Self::default();
        let mut seen: Vec<String> = Vec::new();

        for (key, value) in decode_pairs(query) {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key.clone());
            trace!(param = %key, value = %value, "Parsing filter parameter");

            match key.as_str() {
                RANGE => overlay.time_range = parse_or_skip(&key, &value),
                FROM => overlay.custom_from = parse_date(&key, &value),
                TO => overlay.custom_to = parse_date(&key, &value),
                MODEL if !value.is_empty() => overlay.model = Some(value),
                REGION if !value.is_empty() => overlay.region = Some(value),
                SENTIMENT => overlay.advanced.sentiment = parse_or_skip(&key, &value),
                HIDE_BOTS => overlay.advanced.hide_bots = parse_flag(&key, &value),
                VERIFIED => overlay.advanced.verified_only = parse_flag(&key, &value),
                _ => {}
            }
        }

        overlay
    }

    pub fn is_empty(&self) -> bool {
        self.time_range.is_none()
            && self.custom_from.is_none()
            && self.custom_to.is_none()
            && self.model.is_none()
            && self.region.is_none()
            && self.advanced.is_empty()
    }

    /// Layer this overlay over `base`.
    ///
    /// When the overlay names a time range, its own date bounds replace the
    /// base bounds entirely, so a linked `range=custom&from=…` never inherits
    /// a stale `to`. Without a range, bounds only refine a base that is
    /// already custom.
    pub fn apply_to(&self, base: FilterConfiguration) -> FilterConfiguration {
        let mut next = base;

        match self.time_range {
            Some(range) => {
                next.time_range = range;
                next.custom_from = self.custom_from;
                next.custom_to = self.custom_to;
            }
            None if next.time_range == TimeRange::Custom => {
                if self.custom_from.is_some() {
                    next.custom_from = self.custom_from;
                }
                if self.custom_to.is_some() {
                    next.custom_to = self.custom_to;
                }
            }
            None => {}
        }
        if let Some(model) = &self.model {
            next.model = model.clone();
        }
        if let Some(region) = &self.region {
            next.region = region.clone();
        }
        next.advanced = next.advanced.merged(self.advanced);

        next.normalized()
    }
}

fn parse_or_skip<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!(param = key, value, "Ignoring malformed filter parameter");
            None
        }
    }
}

fn parse_date(key: &str, value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(param = key, value, "Ignoring malformed date parameter");
            None
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => {
            debug!(param = key, value, "Ignoring malformed flag parameter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SentimentFilter;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_defaults_emit_only_range() {
        assert_eq!(query_string(&FilterConfiguration::default()), "range=7d");
    }

    #[test]
    fn test_model_scenario() {
        let config = FilterConfiguration::default().with_model("GPT-4o");
        assert_eq!(query_string(&config), "range=7d&model=GPT-4o");
    }

    #[test]
    fn test_hide_bots_scenario() {
        let config =
            FilterConfiguration::default().with_advanced(AdvancedFiltersPatch::new().hide_bots(true));
        assert_eq!(query_string(&config), "range=7d&hideBots=1");
    }

    #[test]
    fn test_open_ended_custom_range_scenario() {
        let config = FilterConfiguration::default().with_custom_range(Some(date("2024-02-01")), None);
        assert_eq!(query_string(&config), "range=custom&from=2024-02-01");
    }

    #[test]
    fn test_full_ordering() {
        let config = FilterConfiguration::default()
            .with_custom_range(Some(date("2024-01-01")), Some(date("2024-01-31")))
            .with_model("Claude")
            .with_region("EU")
            .with_advanced(
                AdvancedFiltersPatch::new()
                    .sentiment(SentimentFilter::Negative)
                    .hide_bots(true)
                    .verified_only(true),
            );
        assert_eq!(
            query_string(&config),
            "range=custom&from=2024-01-01&to=2024-01-31&model=Claude&region=EU&sentiment=negative&hideBots=1&verified=1"
        );
    }

    #[test]
    fn test_stale_bounds_never_emitted_outside_custom() {
        // Bypass the builder to simulate a hand-built invalid value.
        let config = FilterConfiguration {
            custom_from: Some(date("2024-01-01")),
            ..FilterConfiguration::default()
        };
        assert_eq!(query_string(&config), "range=7d");
    }

    #[test]
    fn test_values_are_form_encoded() {
        let config = FilterConfiguration::default().with_model("Claude 3 & co");
        assert_eq!(query_string(&config), "range=7d&model=Claude+3+%26+co");

        let overlay = FilterOverlay::parse(&query_string(&config));
        assert_eq!(overlay.model.as_deref(), Some("Claude 3 & co"));
    }

    #[test]
    fn test_params_lookup() {
        let params = FilterParams::from_config(&FilterConfiguration::default().with_region("LATAM"));
        assert_eq!(params.get(RANGE), Some("7d"));
        assert_eq!(params.get(REGION), Some("LATAM"));
        assert_eq!(params.get(MODEL), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_parse_ignores_unknown_and_malformed() {
        let overlay =
            FilterOverlay::parse("?range=90d&model=Claude&utm_source=x&sentiment=angry&hideBots=yes&from=2024-13-01");
        assert_eq!(overlay.time_range, None);
        assert_eq!(overlay.model.as_deref(), Some("Claude"));
        assert_eq!(overlay.advanced.sentiment, None);
        assert_eq!(overlay.advanced.hide_bots, None);
        assert_eq!(overlay.custom_from, None);
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let overlay = FilterOverlay::parse("model=A&model=B");
        assert_eq!(overlay.model.as_deref(), Some("A"));
    }

    #[test]
    fn test_parse_empty_query() {
        assert!(FilterOverlay::parse("").is_empty());
        assert!(FilterOverlay::parse("?").is_empty());
        assert!(FilterOverlay::parse("&&").is_empty());
    }

    #[test]
    fn test_apply_range_replaces_bounds() {
        let base = FilterConfiguration::default()
            .with_custom_range(Some(date("2023-01-01")), Some(date("2023-12-31")));
        let next = FilterOverlay::parse("range=custom&from=2024-02-01").apply_to(base);
        assert_eq!(next.custom_from, Some(date("2024-02-01")));
        assert_eq!(next.custom_to, None);
    }

    #[test]
    fn test_apply_bounds_without_range_refine_custom_base() {
        let base = FilterConfiguration::default()
            .with_custom_range(Some(date("2023-01-01")), Some(date("2023-12-31")));
        let next = FilterOverlay::parse("to=2023-06-30").apply_to(base);
        assert_eq!(next.custom_from, Some(date("2023-01-01")));
        assert_eq!(next.custom_to, Some(date("2023-06-30")));

        let rolling = FilterOverlay::parse("to=2023-06-30").apply_to(FilterConfiguration::default());
        assert_eq!(rolling.custom_to, None);
    }

    #[test]
    fn test_apply_bounds_dropped_for_rolling_range() {
        let next = FilterOverlay::parse("range=30d&from=2024-01-01").apply_to(FilterConfiguration::default());
        assert_eq!(next.time_range, TimeRange::Last30Days);
        assert_eq!(next.custom_from, None);
    }

    #[test]
    fn test_apply_merges_advanced_shallowly() {
        let base =
            FilterConfiguration::default().with_advanced(AdvancedFiltersPatch::new().hide_bots(true));
        let next = FilterOverlay::parse("verified=1").apply_to(base);
        assert!(next.advanced.hide_bots);
        assert!(next.advanced.verified_only);
    }

    #[test]
    fn test_decode_pairs_handles_bare_keys() {
        let pairs = decode_pairs("a&b=2&c=");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), String::new()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
    }
}
