//! Page address synchronization.
//!
//! The URL carries the minimal filter query (see `vantage_core::query`), so a
//! copied link reproduces the view. [`UrlAdapter`] rewrites the query string
//! after every store transition by *replacing* the current history entry:
//! filter changes never add back/forward entries and never trigger a
//! navigation.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

use vantage_core::{query_string, FilterConfiguration, FilterOverlay};

use crate::store::SyncTarget;

/// The navigable page address.
pub trait Location: Send + Sync {
    /// Full address of the current history entry.
    fn href(&self) -> String;

    /// Query string of the current entry, without the leading `?`.
    fn query(&self) -> String;

    /// Replace the current entry's query string in place (no navigation).
    fn replace_query(&self, query: &str);
}

/// One history entry split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageUrl {
    base: String,
    query: String,
    fragment: Option<String>,
}

impl PageUrl {
    fn parse(href: &str) -> Self {
        let (rest, fragment) = match href.split_once('#') {
            Some((rest, frag)) => (rest, Some(frag.to_string())),
            None => (href, None),
        };
        let (base, query) = rest.split_once('?').unwrap_or((rest, ""));
        Self {
            base: base.to_string(),
            query: query.to_string(),
            fragment,
        }
    }

    fn href(&self) -> String {
        let mut out = self.base.clone();
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

#[derive(Debug)]
struct History {
    entries: Vec<PageUrl>,
    index: usize,
}

impl History {
    fn current(&self) -> &PageUrl {
        &self.entries[self.index]
    }

    fn current_mut(&mut self) -> &mut PageUrl {
        &mut self.entries[self.index]
    }
}

/// In-process location with a session history.
///
/// `navigate`, `back` and `forward` model what the user or the browser does
/// outside the filter store; after them the store should be re-synced with
/// `FilterStore::init_from_url`.
#[derive(Debug)]
pub struct MemoryLocation {
    history: Mutex<History>,
}

impl MemoryLocation {
    pub fn new(href: &str) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![PageUrl::parse(href)],
                index: 0,
            }),
        }
    }

    fn history(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a new history entry, discarding any forward entries.
    pub fn navigate(&self, href: &str) {
        let mut history = self.history();
        let next = history.index + 1;
        history.entries.truncate(next);
        history.entries.push(PageUrl::parse(href));
        history.index = next;
    }

    /// Step back one entry. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        let mut history = self.history();
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    /// Step forward one entry. Returns `false` at the end of history.
    pub fn forward(&self) -> bool {
        let mut history = self.history();
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    pub fn history_len(&self) -> usize {
        self.history().entries.len()
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        self.history().current().href()
    }

    fn query(&self) -> String {
        self.history().current().query.clone()
    }

    fn replace_query(&self, query: &str) {
        self.history().current_mut().query = query.to_string();
    }
}

/// Keeps the page query string equal to the store's minimal serialization.
pub struct UrlAdapter {
    location: Arc<dyn Location>,
}

impl UrlAdapter {
    pub fn new(location: Arc<dyn Location>) -> Self {
        Self { location }
    }

    /// Recognized filter values in the current address.
    pub fn read(&self) -> FilterOverlay {
        FilterOverlay::parse(&self.location.query())
    }
}

impl SyncTarget for UrlAdapter {
    fn name(&self) -> &'static str {
        "url"
    }

    fn on_change(&self, config: &FilterConfiguration) {
        let next = query_string(config);
        if self.location.query() == next {
            trace!(query = %next, "URL already canonical");
            return;
        }
        debug!(
            subsystem = "sync",
            component = "url_adapter",
            query = %next,
            "Replacing URL query"
        );
        self.location.replace_query(&next);
    }
}
