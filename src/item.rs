//! Cache item types and the tick-count clock shared by all stores.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sentinel deadline for entries that never expire. The timestamp domain has
/// no true "infinite" value, so the far end of it stands in for one.
pub const FAR_FUTURE_TICKS: i64 = i64::MAX;

/// Current time as a millisecond tick count, directly comparable with the
/// persisted `exp` column.
pub fn now_ticks() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// How an entry's lifetime is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirationMode {
    /// Entry never expires.
    None,
    /// Entry expires `timeout` after it was written.
    Absolute,
    /// Entry should expire `timeout` after last access. The bundled policy
    /// approximates this as absolute; see `store::ExpiryPolicy`.
    Sliding,
    /// Store decides; treated like `None` by the bundled policy.
    Default,
}

impl ExpirationMode {
    /// True for the modes that carry a meaningful timeout.
    pub fn is_timed(self) -> bool {
        matches!(self, ExpirationMode::Absolute | ExpirationMode::Sliding)
    }
}

/// A single fetched or to-be-stored entry, keyed by its string id.
///
/// Produced on read, consumed on write. The persisted row keeps only the
/// resolved deadline; mode and timeout are flattened into it on write and
/// synthesized back on read.
#[derive(Clone, Debug)]
pub struct CacheItem<V> {
    /// String id of the entry (unique per store).
    pub key: String,
    /// Optional region scope. Stores that do not support regions reject
    /// items carrying one.
    pub region: Option<String>,
    /// Decoded value.
    pub value: V,
    /// Expiration mode this item was stored (or returned) with.
    pub mode: ExpirationMode,
    /// Timeout paired with `mode`; ignored for `None`/`Default`.
    pub timeout: Duration,
    /// Tick count of the last read, `now` at construction.
    pub last_accessed: i64,
}

impl<V> CacheItem<V> {
    /// Item with store-default expiration.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self::with_expiration(key, value, ExpirationMode::Default, Duration::ZERO)
    }

    /// Item with an explicit expiration mode and timeout.
    pub fn with_expiration(
        key: impl Into<String>,
        value: V,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Self {
        CacheItem {
            key: key.into(),
            region: None,
            value,
            mode,
            timeout,
            last_accessed: now_ticks(),
        }
    }

    /// Scope the item to a region.
    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Replace the value, keeping key and expiration metadata.
    pub fn with_value<W>(self, value: W) -> CacheItem<W> {
        CacheItem {
            key: self.key,
            region: self.region,
            value,
            mode: self.mode,
            timeout: self.timeout,
            last_accessed: self.last_accessed,
        }
    }
}
