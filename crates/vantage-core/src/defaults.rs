//! Centralized default constants for vantage.
//!
//! **This module is the single source of truth** for shared default values.
//! Other crates and the CLI reference these constants instead of defining
//! their own magic strings and numbers.

// =============================================================================
// FILTER SENTINELS
// =============================================================================

/// Model dropdown value meaning "no model filter".
pub const ALL_MODELS: &str = "All models";

/// Region dropdown value meaning "no region filter".
pub const ANY_REGION: &str = "Region";

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Durable storage slot holding the serialized filter configuration.
///
/// The `v1` suffix is part of the key so a future incompatible layout can
/// live next to it without reading stale data.
pub const FILTERS_STORAGE_KEY: &str = "global:filters:v1";

/// Default path for the file-backed storage used by the CLI.
pub const STATE_FILE: &str = "vantage-state.json";

/// Default page location when none is supplied.
pub const PAGE_URL: &str = "http://localhost:3000/";

// =============================================================================
// QUERY CACHE
// =============================================================================

/// Maximum number of cache entries kept before least-recently-used eviction.
pub const CACHE_CAPACITY: usize = 256;

/// Window after a successful fetch during which revalidation is skipped (ms).
pub const DEDUPE_INTERVAL_MS: u64 = 2_000;

/// Buffer size of the cache change notification channel.
pub const CACHE_EVENT_CAPACITY: usize = 256;

// =============================================================================
// BACKEND
// =============================================================================

/// Default backend API base URL.
pub const API_URL: &str = "http://localhost:8000";

/// Default HTTP request timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
