//! SQLite-backed expiring store.
//!
//! Durable string→value map over a single embedded connection. Expiration is
//! lazy on read (an expired row reads as absent and triggers an opportunistic
//! sweep) and eager at open; there is no background timer.

use super::{AbsoluteExpiry, CacheStore, ExpiryPolicy};
use crate::error::{Error, Result};
use crate::item::{now_ticks, CacheItem, ExpirationMode};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

const CREATE_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS entries (key TEXT PRIMARY KEY, value BLOB, exp INTEGER NOT NULL)";

// Redundant with the primary key constraint; kept for schema compatibility
// with databases written by earlier revisions.
const CREATE_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS ix_entries_key ON entries (key)";

const SWEEP_SQL: &str = "DELETE FROM entries WHERE exp <= ?1";

/// Expiration metadata returned on hits. The row only keeps a deadline, so
/// reads are normalized to a long absolute timeout rather than pretending
/// the original mode survived.
const SYNTHETIC_READ_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Configuration for [`SqliteStore`].
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Database file location. Missing file and containing directories are
    /// created, not reported as errors.
    pub path: PathBuf,
    /// Use WAL journaling with `synchronous=NORMAL`.
    pub wal: bool,
    /// Sweep expired rows once at open.
    pub eager_sweep: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: PathBuf::from("sqlstash.db"),
            wal: true,
            eager_sweep: true,
        }
    }
}

impl SqliteConfig {
    /// Config for a database at `path`, defaults otherwise.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Expiration-aware persistent store over one SQLite connection.
///
/// The connection is a single shared mutable resource: a mutex serializes
/// every statement, and `add` additionally wraps its existence check + insert
/// in an explicit transaction so no statement can interleave between the two.
///
/// # Example
///
/// ```no_run
/// # use sqlstash::{CacheItem, CacheStore, SqliteConfig, SqliteStore};
/// # use sqlstash::Result;
/// # fn example() -> Result<()> {
/// let store: SqliteStore<String> = SqliteStore::open(SqliteConfig::at("cache.db"))?;
/// store.put(CacheItem::new("greeting", "hello".to_string()))?;
/// assert!(store.exists("greeting", None)?);
/// # Ok(())
/// # }
/// ```
pub struct SqliteStore<V> {
    conn: Mutex<Option<Connection>>,
    policy: Box<dyn ExpiryPolicy>,
    metrics: Box<dyn CacheMetrics>,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqliteStore<V> {
    /// Open (creating if necessary) the database and prepare the schema.
    ///
    /// # Errors
    /// Returns `Err` when the containing directory cannot be created or the
    /// engine rejects the schema statements.
    pub fn open(config: SqliteConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        if config.wal {
            // journal_mode returns the resulting mode as a row.
            let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        conn.execute(CREATE_TABLE_SQL, [])?;
        conn.execute(CREATE_INDEX_SQL, [])?;

        let store = SqliteStore {
            conn: Mutex::new(Some(conn)),
            policy: Box::new(AbsoluteExpiry),
            metrics: Box::new(NoOpMetrics),
            _value: PhantomData,
        };

        if config.eager_sweep {
            let swept = store.evict_expired()?;
            if swept > 0 {
                debug!("✓ swept {} expired entries at open", swept);
            }
        }

        info!("✓ sqlite store ready at {}", config.path.display());
        Ok(store)
    }

    /// Replace the expiry policy.
    pub fn with_policy(mut self, policy: Box<dyn ExpiryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Install a metrics handler, seeding it with the live row count that
    /// survived from a previous run.
    ///
    /// # Errors
    /// Returns `Err` when the seed count query fails.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Result<Self> {
        let live = self.live_rows()?;
        metrics.set_initial_count(live);
        self.metrics = metrics;
        Ok(self)
    }

    fn live_rows(&self) -> Result<u64> {
        let now = now_ticks();
        self.with_conn(|conn| {
            let live: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE exp > ?1",
                params![now],
                |row| row.get(0),
            )?;
            Ok(live as u64)
        })
    }

    /// Delete every row whose deadline has passed. Runs at open and after a
    /// lazy miss; callers may also invoke it directly.
    ///
    /// # Errors
    /// Returns `Err` on engine failure or when the store is closed.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = now_ticks();
        self.with_conn(|conn| Ok(conn.execute(SWEEP_SQL, params![now])?))
    }

    /// Close the connection. Idempotent: the first call releases it, later
    /// calls are no-ops. Any further cache operation fails with
    /// [`Error::StoreClosed`].
    ///
    /// # Errors
    /// Returns `Err` when the engine fails to shut the connection down.
    pub fn close(&self) -> Result<()> {
        let conn = {
            let mut guard = self.lock_conn();
            guard.take()
        };
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| Error::Database(e))?;
            debug!("✓ sqlite store closed");
        }
        Ok(())
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> Result<R>) -> Result<R> {
        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;
        f(conn)
    }

    /// Sweep inline after a lazy miss was observed. Best-effort: failures are
    /// logged, never surfaced to the read that triggered them.
    fn sweep_after_miss(conn: &Connection, now: i64) {
        match conn.execute(SWEEP_SQL, params![now]) {
            Ok(swept) if swept > 0 => debug!("✓ swept {} expired entries after miss", swept),
            Ok(_) => {}
            Err(e) => warn!("⚠ expired-entry sweep failed: {}", e),
        }
    }
}

impl<V> CacheStore<V> for SqliteStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn add(&self, item: CacheItem<V>) -> Result<bool> {
        if item.region.is_some() {
            return Err(Error::region_not_supported("add"));
        }

        let blob = serialization::serialize(&item.value)?;
        let now = now_ticks();
        let deadline = self.policy.deadline(item.mode, item.timeout, now);

        self.with_conn(|conn| {
            // Existence check and insert must not interleave with any other
            // statement on this connection.
            let tx = conn.transaction()?;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT exp FROM entries WHERE key = ?1",
                    params![item.key],
                    |row| row.get(0),
                )
                .optional()?;

            if matches!(existing, Some(exp) if exp > now) {
                debug!("✗ add {} -> rejected, live entry present", item.key);
                return Ok(false);
            }

            tx.execute(
                "INSERT OR REPLACE INTO entries (key, value, exp) VALUES (?1, ?2, ?3)",
                params![item.key, blob, deadline],
            )?;
            tx.commit()?;
            debug!("✓ add {}", item.key);
            Ok(true)
        })
    }

    fn put(&self, item: CacheItem<V>) -> Result<()> {
        if item.region.is_some() {
            return Err(Error::region_not_supported("put"));
        }

        let blob = serialization::serialize(&item.value)?;
        let now = now_ticks();
        let deadline = self.policy.deadline(item.mode, item.timeout, now);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entries (key, value, exp) VALUES (?1, ?2, ?3)",
                params![item.key, blob, deadline],
            )?;
            debug!("✓ put {}", item.key);
            Ok(())
        })
    }

    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        if region.is_some() {
            return Err(Error::region_not_supported("get"));
        }

        let now = now_ticks();
        let blob = self.with_conn(|conn| {
            let row: Option<(Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT value, exp FROM entries WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((blob, exp)) if exp > now => {
                    if let Some(new_exp) = self.policy.read_refresh(exp, now) {
                        conn.execute(
                            "UPDATE entries SET exp = ?1 WHERE key = ?2",
                            params![new_exp, key],
                        )?;
                    }
                    Ok(Some(blob))
                }
                Some(_) => {
                    debug!("✗ get {} -> expired", key);
                    Self::sweep_after_miss(conn, now);
                    Ok(None)
                }
                None => Ok(None),
            }
        })?;

        match blob {
            Some(blob) => {
                let value = serialization::deserialize(&blob)?;
                self.metrics.record_hit(key);
                debug!("✓ get {} -> hit", key);
                Ok(Some(CacheItem {
                    key: key.to_string(),
                    region: None,
                    value,
                    mode: ExpirationMode::Absolute,
                    timeout: SYNTHETIC_READ_TTL,
                    last_accessed: now,
                }))
            }
            None => {
                self.metrics.record_miss(key);
                Ok(None)
            }
        }
    }

    fn exists(&self, key: &str, region: Option<&str>) -> Result<bool> {
        if region.is_some() {
            return Err(Error::region_not_supported("exists"));
        }

        let now = now_ticks();
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM entries WHERE key = ?1 AND exp > ?2",
                    params![key, now],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        if region.is_some() {
            return Err(Error::region_not_supported("remove"));
        }

        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
            if affected > 0 {
                debug!("✓ remove {}", key);
            }
            Ok(affected > 0)
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM entries", [])?;
            warn!("⚠ cleared {} cache entries", affected);
            Ok(())
        })
    }

    fn count(&self) -> Result<u64> {
        self.live_rows()
    }
}
