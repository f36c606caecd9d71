//! Statistics hooks for cache stores.

/// Statistics collaborator notified by stores.
///
/// `set_initial_count` is a first-class operation so a persistent store can
/// seed hit/miss accounting from rows that survived a restart.
pub trait CacheMetrics: Send + Sync {
    /// A read found a live entry.
    fn record_hit(&self, _key: &str) {}

    /// A read found nothing (including lazily-expired rows).
    fn record_miss(&self, _key: &str) {}

    /// Seed counters from the number of entries already persisted when the
    /// store was opened.
    fn set_initial_count(&self, _count: u64) {}
}

/// Default metrics handler that records nothing.
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}
