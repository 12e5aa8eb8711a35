//! Cache key derivation for dashboard queries.
//!
//! A key is `path?<filter params>&<view params>`. The filter part always
//! comes from [`FilterParams`], the same derivation the URL adapter writes, so
//! two views asking for the same endpoint under equal filters produce
//! byte-identical keys and share one cache entry.

use std::fmt;

use crate::filters::FilterConfiguration;
use crate::query::{encode_pairs, FilterParams};

/// Builder for a cache key / request URL path.
///
/// # Example
///
/// ```
/// use vantage_core::{FilterConfiguration, QueryKey};
///
/// let key = QueryKey::new("/api/mentions")
///     .with_filters(&FilterConfiguration::default().with_model("GPT-4o"))
///     .param("limit", "50");
/// assert_eq!(key.as_str(), "/api/mentions?range=7d&model=GPT-4o&limit=50");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    path: String,
    filters: Option<FilterParams>,
    params: Vec<(String, String)>,
    rendered: String,
}

impl QueryKey {
    /// Key for `path` with no parameters yet.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            rendered: path.clone(),
            path,
            filters: None,
            params: Vec::new(),
        }
    }

    /// Attach the minimal filter parameters of `config`.
    pub fn with_filters(mut self, config: &FilterConfiguration) -> Self {
        self.filters = Some(FilterParams::from_config(config));
        self.render();
        self
    }

    /// Append a view-local parameter. Empty values are skipped.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.params.push((key.into(), value));
            self.render();
        }
        self
    }

    /// Append a view-local parameter only when `value` is present.
    pub fn param_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filters(&self) -> Option<&FilterParams> {
        self.filters.as_ref()
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn into_string(self) -> String {
        self.rendered
    }

    fn render(&mut self) {
        let mut query = self
            .filters
            .as_ref()
            .map(FilterParams::to_query_string)
            .unwrap_or_default();
        if !self.params.is_empty() {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&encode_pairs(&self.params));
        }

        self.rendered = if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        };
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for QueryKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl From<QueryKey> for String {
    fn from(key: QueryKey) -> Self {
        key.rendered
    }
}
