//! Storage handles and the contract they share with the host framework.

use crate::error::Result;
use crate::item::{CacheItem, ExpirationMode, FAR_FUTURE_TICKS};
use std::time::Duration;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteConfig, SqliteStore};

/// The string-keyed cache contract.
///
/// Implemented by storage handles (`SqliteStore`, `MemoryStore`) and consumed
/// by the typed facade; the orchestration host is modeled as anything that
/// implements it, never a concrete dependency.
///
/// Items carry an expiration mode and timeout; keys are opaque string ids.
/// Region-scoped calls may fail with `Error::NotSupported`; stores must
/// never silently fall back to the unscoped behavior.
pub trait CacheStore<V>: Send + Sync {
    /// Insert the item only if no live entry exists under its key.
    ///
    /// Returns `false` without mutating anything when a non-expired entry is
    /// already present. Atomic with respect to other operations on the store.
    fn add(&self, item: CacheItem<V>) -> Result<bool>;

    /// Unconditional upsert, replacing value and expiration alike.
    fn put(&self, item: CacheItem<V>) -> Result<()>;

    /// Fetch a live entry. Expired-but-present entries read as absent.
    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>>;

    /// True iff a live entry exists; never materializes the value.
    fn exists(&self, key: &str, region: Option<&str>) -> Result<bool>;

    /// Delete unconditionally. True iff a row was deleted, live or not;
    /// callers only care that one existed.
    fn remove(&self, key: &str, region: Option<&str>) -> Result<bool>;

    /// Delete every entry.
    fn clear(&self) -> Result<()>;

    /// Number of live entries; expired-but-unswept rows are excluded by
    /// predicate, not by sweeping first.
    fn count(&self) -> Result<u64>;
}

/// Maps an item's expiration mode and timeout onto the tick-count domain.
///
/// Kept as a seam so true sliding refresh can be added without touching
/// storage internals.
pub trait ExpiryPolicy: Send + Sync {
    /// Resolve the deadline to persist for an entry written at `now`.
    fn deadline(&self, mode: ExpirationMode, timeout: Duration, now: i64) -> i64;

    /// Optional new deadline after a hit on an entry currently expiring at
    /// `stored_deadline`. `None` leaves the row untouched.
    fn read_refresh(&self, stored_deadline: i64, now: i64) -> Option<i64> {
        let _ = (stored_deadline, now);
        None
    }
}

/// The bundled policy: sliding is approximated as absolute and never
/// refreshed on read. Untimed modes map to the far-future sentinel since the
/// timestamp domain has no infinite value.
pub struct AbsoluteExpiry;

impl ExpiryPolicy for AbsoluteExpiry {
    fn deadline(&self, mode: ExpirationMode, timeout: Duration, now: i64) -> i64 {
        match mode {
            ExpirationMode::None | ExpirationMode::Default => FAR_FUTURE_TICKS,
            ExpirationMode::Absolute | ExpirationMode::Sliding => {
                let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
                now.saturating_add(millis)
            }
        }
    }
}
