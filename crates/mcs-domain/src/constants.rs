//! Domain-wide constants
//!
//! Central location for defaults shared across layers. Transport and
//! provider specific constants live in their own crates.

/// Default embedding dimension (matches the default remote model)
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Default tool invocation timeout in milliseconds
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// Default embedding call timeout in milliseconds
pub const DEFAULT_EMBEDDING_TIMEOUT_MS: u64 = 10_000;

/// Default vector search timeout in milliseconds
pub const DEFAULT_VECTOR_SEARCH_TIMEOUT_MS: u64 = 2_000;

/// Default remote manifest fetch timeout in milliseconds
pub const DEFAULT_MANIFEST_FETCH_TIMEOUT_MS: u64 = 15_000;

/// Default health check timeout in milliseconds
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 3_000;

/// Grace window granted to a handler after cancellation, in milliseconds
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 2_000;

/// Default per-capability concurrent invocation cap
pub const DEFAULT_PER_CAPABILITY_CONCURRENCY: usize = 64;

/// Default global concurrent invocation cap
pub const DEFAULT_GLOBAL_CONCURRENCY: usize = 512;

/// Default selector time budget in milliseconds
pub const DEFAULT_SELECTOR_TIMEOUT_MS: u64 = 1_500;

/// Minimum results the selector keeps even below the score floor
pub const DEFAULT_SELECTOR_MIN_RESULTS: usize = 1;

/// Selector score floor; weaker hits are dropped
pub const SELECTOR_SCORE_FLOOR: f64 = 0.1;

/// Upper bound on the selector `k` parameter
pub const SELECTOR_MAX_K: usize = 50;

/// Retry backoff base delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 250;

/// Retry backoff delay cap in milliseconds
pub const RETRY_MAX_DELAY_MS: u64 = 4_000;

/// Maximum retry attempts for transient upstream failures
pub const RETRY_MAX_ATTEMPTS: u32 = 5;

/// Retry jitter as a fraction of the computed delay
pub const RETRY_JITTER_FRACTION: f64 = 0.2;

/// Seconds after which an index record with no live capability is stale
pub const DEFAULT_INDEX_STALE_AFTER_SECS: u64 = 30;
