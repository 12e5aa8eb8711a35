//! Structured logging field name constants for vantage.
//!
//! All crates use these constants for structured `tracing` fields so log
//! queries can rely on one vocabulary across the store, adapters and cache.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded behaviour that needs operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, bootstrap, reset) |
//! | DEBUG | Decision points: filter transitions, cache hits, dedup skips |
//! | TRACE | Per-parameter parsing, per-notification fan-out |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "store", "sync", "query", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "filter_store", "storage_adapter", "url_adapter", "query_cache"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "set_model", "init_from_url", "revalidate", "mutate"
pub const OPERATION: &str = "op";

// ─── Filter fields ─────────────────────────────────────────────────────────

/// Minimal query string of the filter configuration.
pub const QUERY: &str = "query";

/// Query parameter name being parsed.
pub const PARAM: &str = "param";

/// Sync target receiving a change notification.
pub const SYNC_TARGET: &str = "sync_target";

/// Storage slot the filters are persisted under.
pub const STORAGE_KEY: &str = "storage_key";

// ─── Cache fields ──────────────────────────────────────────────────────────

/// Cache key of a query.
pub const CACHE_KEY: &str = "cache_key";

/// Cache-wide monotonic request version.
pub const REQUEST_VERSION: &str = "request_version";

/// Number of entries currently cached.
pub const ENTRY_COUNT: &str = "entry_count";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// HTTP status code returned by the backend.
pub const STATUS: &str = "status";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
