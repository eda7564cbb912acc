//! TTL freshness policy.

use crate::models::CacheMetadata;
use chrono::{DateTime, Duration, Utc};

/// Converts a TTL in hours into a duration.
///
/// Returns `None` for TTLs too large to represent, which callers treat as
/// "never expires".
#[must_use]
pub fn ttl_duration(ttl_hours: u64) -> Option<Duration> {
    i64::try_from(ttl_hours).ok().and_then(Duration::try_hours)
}

/// Returns true if a cached entry may be served without contacting the
/// endpoint.
///
/// An entry is fresh when it passed validation and is younger than
/// `ttl_hours`. A TTL of zero is never fresh. Timestamps in the future count
/// as age zero.
#[must_use]
pub fn is_fresh(metadata: &CacheMetadata, ttl_hours: u64, now: DateTime<Utc>) -> bool {
    if ttl_hours == 0 || !metadata.is_valid {
        return false;
    }
    ttl_duration(ttl_hours).is_none_or(|ttl| metadata.age(now) < ttl)
}
