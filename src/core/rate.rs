//! Exchange rate record kept in the cache

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fiat units per one asset unit, stamped with the time it was derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedRate {
    #[serde(alias = "price")]
    pub rate: f64,
    /// Epoch seconds
    pub timestamp: i64,
}

impl CachedRate {
    pub fn new(rate: f64, timestamp: i64) -> Self {
        Self { rate, timestamp }
    }

    /// Stamps `rate` with the current time.
    pub fn now(rate: f64) -> Self {
        Self::new(rate, Utc::now().timestamp())
    }

    /// A stored rate is only usable when it is a positive finite number.
    pub fn is_valid(&self) -> bool {
        self.rate.is_finite() && self.rate > 0.0
    }

    /// Stale once more than `validity` has elapsed since `timestamp`.
    pub fn is_fresh(&self, validity: Duration, now: i64) -> bool {
        let validity = i64::try_from(validity.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(self.timestamp) <= validity
    }

    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn fetched_at(&self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

/// Which branch of the resolution produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOrigin {
    /// Cached value inside the validity window
    Fresh,
    /// Derived from the live feeds just now
    Live,
    /// Cached value past the validity window, used because the feeds failed
    Stale,
    /// Already resolved earlier by this oracle instance
    Memoized,
}

impl std::fmt::Display for RateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RateOrigin::Fresh => "cache",
                RateOrigin::Live => "live",
                RateOrigin::Stale => "stale cache",
                RateOrigin::Memoized => "memory",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub cached: CachedRate,
    pub origin: RateOrigin,
}

impl ResolvedRate {
    pub fn rate(&self) -> f64 {
        self.cached.rate
    }
}
