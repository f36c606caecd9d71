//! # sqlstash
//!
//! An embedded, expiration-aware key-value cache store with a typed-key facade.
//!
//! ## Features
//!
//! - **Persistent:** entries live in a single-file SQLite database that is
//!   created on demand and survives restarts
//! - **Expiration Aware:** absolute timeouts with lazy misses plus eager and
//!   opportunistic sweeps; policy-pluggable via [`ExpiryPolicy`]
//! - **Insert-If-Absent:** `add` is atomic over the connection, wrapped in an
//!   explicit transaction
//! - **Typed Keys:** [`TypedCache`] maps any serde key type onto the
//!   string-keyed store contract through a tagged binary envelope + base64
//! - **Store Agnostic:** everything speaks the [`CacheStore`] trait, so a
//!   host framework (or the bundled [`MemoryStore`]) can front the SQLite
//!   handle
//!
//! ## Quick Start
//!
//! ```no_run
//! use sqlstash::{SqliteConfig, SqliteStore, TypedCache};
//!
//! # fn main() -> sqlstash::Result<()> {
//! let store: SqliteStore<String> = SqliteStore::open(SqliteConfig::at("app-cache.db"))?;
//! let cache: TypedCache<u64, String, _> = TypedCache::new(store);
//!
//! cache.put(&42, "answer".to_string())?;
//! assert_eq!(cache.get(&42)?, Some("answer".to_string()));
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod error;
pub mod facade;
pub mod item;
pub mod observability;
pub mod serialization;
pub mod store;

// Re-exports for convenience
pub use error::{Error, Result};
pub use facade::{TypedCache, TypedCacheItem};
pub use item::{CacheItem, ExpirationMode};
pub use observability::{CacheMetrics, NoOpMetrics};
pub use store::{AbsoluteExpiry, CacheStore, ExpiryPolicy, MemoryStore, SqliteConfig, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
