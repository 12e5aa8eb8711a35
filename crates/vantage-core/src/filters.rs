//! Global filter configuration shared by every dashboard view.
//!
//! A [`FilterConfiguration`] is an immutable value. Mutations produce a new
//! value (see `vantage-store`), so any observer holding a snapshot sees a
//! consistent combination of time range, model, region and advanced filters.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::defaults::{ALL_MODELS, ANY_REGION};
use crate::error::Error;

// =============================================================================
// TIME RANGE
// =============================================================================

/// Selectable time window for every dashboard query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeRange {
    /// Last 24 hours
    #[serde(rename = "24h")]
    Last24Hours,
    /// Last 7 days
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    /// Last 30 days
    #[serde(rename = "30d")]
    Last30Days,
    /// User-picked `from`/`to` dates
    #[serde(rename = "custom")]
    Custom,
}

impl TimeRange {
    /// All ranges in the order the filter bar presents them.
    pub const ALL: [TimeRange; 4] = [
        TimeRange::Last24Hours,
        TimeRange::Last7Days,
        TimeRange::Last30Days,
        TimeRange::Custom,
    ];

    /// Wire value used in query strings and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Custom => "custom",
        }
    }

    /// Human-readable label shown on the filter bar.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Last24Hours => "Last 24 hours",
            Self::Last7Days => "Last 7 days",
            Self::Last30Days => "Last 30 days",
            Self::Custom => "Custom range",
        }
    }

    /// Length of a rolling window, `None` for custom ranges.
    pub fn window(&self) -> Option<Duration> {
        match self {
            Self::Last24Hours => Some(Duration::days(1)),
            Self::Last7Days => Some(Duration::days(7)),
            Self::Last30Days => Some(Duration::days(30)),
            Self::Custom => None,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::Last24Hours),
            "7d" => Ok(Self::Last7Days),
            "30d" => Ok(Self::Last30Days),
            "custom" => Ok(Self::Custom),
            other => Err(Error::InvalidInput(format!(
                "unknown time range '{}': expected one of 24h, 7d, 30d, custom",
                other
            ))),
        }
    }
}

// =============================================================================
// SENTIMENT
// =============================================================================

/// Sentiment restriction from the advanced filter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SentimentFilter {
    #[default]
    All,
    Positive,
    Neutral,
    Negative,
}

impl SentimentFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// `All` applies no restriction.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for SentimentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(Error::InvalidInput(format!(
                "unknown sentiment '{}': expected one of all, positive, neutral, negative",
                other
            ))),
        }
    }
}

// =============================================================================
// ADVANCED FILTERS
// =============================================================================

/// Advanced filter panel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedFilters {
    pub sentiment: SentimentFilter,
    pub hide_bots: bool,
    pub verified_only: bool,
}

impl AdvancedFilters {
    /// Shallow merge: fields set in `patch` win, the rest are kept.
    pub fn merged(self, patch: AdvancedFiltersPatch) -> Self {
        Self {
            sentiment: patch.sentiment.unwrap_or(self.sentiment),
            hide_bots: patch.hide_bots.unwrap_or(self.hide_bots),
            verified_only: patch.verified_only.unwrap_or(self.verified_only),
        }
    }
}

/// Partial update for [`AdvancedFilters`].
///
/// # Example
///
/// ```
/// use vantage_core::{AdvancedFilters, AdvancedFiltersPatch};
///
/// let next = AdvancedFilters::default().merged(AdvancedFiltersPatch::new().hide_bots(true));
/// assert!(next.hide_bots);
/// assert!(!next.verified_only);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedFiltersPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_bots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_only: Option<bool>,
}

impl AdvancedFiltersPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sentiment(mut self, sentiment: SentimentFilter) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn hide_bots(mut self, hide_bots: bool) -> Self {
        self.hide_bots = Some(hide_bots);
        self
    }

    pub fn verified_only(mut self, verified_only: bool) -> Self {
        self.verified_only = Some(verified_only);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sentiment.is_none() && self.hide_bots.is_none() && self.verified_only.is_none()
    }
}

// =============================================================================
// FILTER CONFIGURATION
// =============================================================================

/// The canonical global filter state.
///
/// Construct through [`FilterConfiguration::default`] and the `with_*`
/// helpers; both keep the custom-range invariant (bounds are only present
/// while the range is [`TimeRange::Custom`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterConfiguration {
    pub time_range: TimeRange,
    pub custom_from: Option<NaiveDate>,
    pub custom_to: Option<NaiveDate>,
    pub model: String,
    pub region: String,
    pub advanced: AdvancedFilters,
}

impl Default for FilterConfiguration {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            custom_from: None,
            custom_to: None,
            model: ALL_MODELS.to_string(),
            region: ANY_REGION.to_string(),
            advanced: AdvancedFilters::default(),
        }
    }
}

impl FilterConfiguration {
    /// Switch range; leaving `custom` drops both bounds.
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self.normalized()
    }

    /// Switch to a custom range with the given (possibly open) bounds.
    pub fn with_custom_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.time_range = TimeRange::Custom;
        self.custom_from = from;
        self.custom_to = to;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_advanced(mut self, patch: AdvancedFiltersPatch) -> Self {
        self.advanced = self.advanced.merged(patch);
        self
    }

    /// Enforce the custom-range invariant.
    pub fn normalized(mut self) -> Self {
        if self.time_range != TimeRange::Custom {
            self.custom_from = None;
            self.custom_to = None;
        }
        self
    }

    /// Whether a model filter is active (not empty, not the sentinel).
    pub fn has_model_filter(&self) -> bool {
        !self.model.is_empty() && self.model != ALL_MODELS
    }

    /// Whether a region filter is active (not empty, not the sentinel).
    pub fn has_region_filter(&self) -> bool {
        !self.region.is_empty() && self.region != ANY_REGION
    }

    /// Filter bar label for the time control.
    pub fn time_label(&self) -> String {
        if self.time_range != TimeRange::Custom {
            return self.time_range.label().to_string();
        }
        if self.custom_from.is_none() && self.custom_to.is_none() {
            return TimeRange::Custom.label().to_string();
        }
        let bound = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "…".into());
        format!(
            "Custom: {} – {}",
            bound(self.custom_from),
            bound(self.custom_to)
        )
    }

    /// Inclusive date window a view should display, relative to `today`.
    ///
    /// Rolling ranges end on `today`. Custom ranges use their bounds, with a
    /// missing `to` meaning `today` and a missing `from` meaning unbounded
    /// (`None`). An inverted custom range is returned swapped; the stored
    /// configuration itself is never reordered.
    pub fn date_bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, NaiveDate) {
        match self.time_range.window() {
            Some(window) => (Some(today - window), today),
            None => {
                let end = self.custom_to.unwrap_or(today);
                match self.custom_from {
                    Some(start) if start > end => (Some(end), start),
                    start => (start, end),
                }
            }
        }
    }
}
