//! # vantage-core
//!
//! Core types for the vantage dashboard filter layer.
//!
//! This crate holds the global filter model, the minimal query-string
//! derivation shared by the URL adapter and the query cache, and the error
//! type the other vantage crates build on.

pub mod defaults;
pub mod error;
pub mod filters;
pub mod key;
pub mod logging;
pub mod query;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use filters::{
    AdvancedFilters, AdvancedFiltersPatch, FilterConfiguration, SentimentFilter, TimeRange,
};
pub use key::QueryKey;
pub use query::{query_string, FilterOverlay, FilterParams};
