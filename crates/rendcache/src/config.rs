//! Tunable constants for the rendezvous descriptor cache.
//!
//! Mirrors the `#define`s `rendcache.c` inherited from `or.h`/`rendcommon.h`
//! (`REND_CACHE_MAX_AGE`, `REND_CACHE_MAX_SKEW`, `MAX_INTRO_POINTS`, the
//! fixed base32/digest lengths) as a single configuration struct so a host
//! process can tune them without recompiling.

use serde::{Deserialize, Serialize};

/// Length in characters of a base32-encoded service id (`rend_get_service_id`'s
/// output length, excluding the version digit).
pub const SERVICE_ID_LEN_BASE32: usize = 16;

/// Length in characters of a base32-encoded descriptor id.
pub const DESC_ID_LEN_BASE32: usize = 32;

/// Length in bytes of a raw (binary) descriptor id digest.
pub const DESC_ID_LEN: usize = 20;

/// Length in bytes of a descriptor cookie.
pub const DESCRIPTOR_COOKIE_LEN: usize = 16;

/// Step, in seconds, by which `clean_directory`'s `served_cutoff` advances
/// between escalation passes.
pub const SERVED_CUTOFF_STEP: i64 = 1800;

/// Seconds a freshly-admitted entry's `last_served` is back-dated by, to
/// damp upload-flooding attacks.
pub const UPLOAD_DAMP: i64 = 3600;

/// Configuration governing freshness, skew tolerance, and introduction-point
/// bounds for the cache.
///
/// # Defaults
///
/// The defaults match the historical Tor values: one day of age tolerance,
/// one day of clock skew tolerance, and a maximum of 10 introduction points
/// per descriptor (the guard-enumeration-attack bound `rendcache.c`
/// enforces in `rend_cache_store_v2_desc_as_client`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendCacheConfig {
    /// Maximum age, in seconds, a descriptor's timestamp may trail `now` by
    /// before the `MAX_SKEW` tolerance is added on top.
    pub max_age: i64,

    /// Clock skew tolerance, in seconds, applied symmetrically: it extends
    /// how far in the past a descriptor may be admitted from (stacked with
    /// `max_age`) and how far in the future it may be dated.
    pub max_skew: i64,

    /// Upper bound on the number of introduction points a client-path
    /// descriptor may carry. Exceeding it is treated as a guard-enumeration
    /// attack and the descriptor is rejected.
    pub max_intro_points: usize,
}

impl Default for RendCacheConfig {
    fn default() -> Self {
        Self {
            max_age: 24 * 60 * 60,
            max_skew: 24 * 60 * 60,
            max_intro_points: 10,
        }
    }
}

impl RendCacheConfig {
    /// The inclusive lower bound `timestamp` must meet (age + skew tolerance
    /// subtracted from `now`). Values strictly less than this are rejected.
    pub fn min_timestamp(&self, now: i64) -> i64 {
        now - self.max_age - self.max_skew
    }

    /// The inclusive upper bound `timestamp` may reach (skew tolerance added
    /// to `now`). Values strictly greater than this are rejected.
    pub fn max_timestamp(&self, now: i64) -> i64 {
        now + self.max_skew
    }
}
