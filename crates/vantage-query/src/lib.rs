//! # vantage-query
//!
//! Stale-while-revalidate data fetching for dashboard views.
//!
//! - [`QueryCache`]: shared, deduplicating cache keyed by request URL
//! - [`QuerySubscription`]: a view whose key follows the filter store
//! - [`Fetcher`] / [`HttpFetcher`]: the network boundary

pub mod cache;
pub mod fetcher;
pub mod subscription;

pub use cache::{CacheConfig, CacheEvent, CacheEventKind, QueryCache, QueryState, Revalidation};
pub use fetcher::{Fetcher, HttpFetcher};
pub use subscription::{QueryRequest, QuerySubscription, SubscriptionOptions};
