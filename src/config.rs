//! Centralized runtime constants for the filter.
//!
//! All tunable capacities, burst sizes, and thresholds are collected here so
//! they can be found and adjusted in a single place rather than scattered
//! across modules.

/// Maximum number of UDP flow entries tracked per address family.
///
/// Eviction is strict LRU once this capacity is reached.
pub const CONNTRACK_CAPACITY: usize = 512;

/// Minimum raw packet length accepted past pre-check (bytes).
///
/// Anything shorter is dropped with reason `"too short"` before any
/// protocol-specific parsing is attempted.
pub const MIN_PACKET_LEN: usize = 20;

/// Accept-decision rate limiter: one token added every this many seconds.
pub const ACCEPT_BUCKET_PERIOD_SECS: u64 = 10;

/// Accept-decision rate limiter: maximum burst of buffered tokens.
pub const ACCEPT_BUCKET_BURST: u32 = 3;

/// Drop-decision rate limiter: one token added every this many seconds.
pub const DROP_BUCKET_PERIOD_SECS: u64 = 5;

/// Drop-decision rate limiter: maximum burst of buffered tokens.
pub const DROP_BUCKET_BURST: u32 = 10;
