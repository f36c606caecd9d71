//! Typed-key facade over a string-keyed cache.
//!
//! Arbitrary typed keys are translated to opaque string ids by encoding them
//! through the envelope codec and base64-encoding the result. Callers only
//! ever see their own key type; the string form never leaks.

use crate::error::{Error, Result};
use crate::item::{now_ticks, CacheItem, ExpirationMode};
use crate::serialization;
use crate::store::CacheStore;
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::time::Duration;

/// Facade-level item: the original typed key next to the typed value, plus
/// the expiration metadata carried through unchanged. Constructed per call,
/// never cached.
#[derive(Clone, Debug)]
pub struct TypedCacheItem<K, V> {
    pub key: K,
    pub region: Option<String>,
    pub value: V,
    pub mode: ExpirationMode,
    pub timeout: Duration,
    pub last_accessed: i64,
}

impl<K, V> TypedCacheItem<K, V> {
    /// Item with store-default expiration.
    pub fn new(key: K, value: V) -> Self {
        Self::with_expiration(key, value, ExpirationMode::Default, Duration::ZERO)
    }

    /// Item with an explicit expiration mode and timeout.
    pub fn with_expiration(key: K, value: V, mode: ExpirationMode, timeout: Duration) -> Self {
        TypedCacheItem {
            key,
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

    /// Repackage an underlying item around an already-known typed key,
    /// avoiding a second decode of the string id.
    fn from_underlying(key: K, item: CacheItem<V>) -> Self {
        TypedCacheItem {
            key,
            region: item.region,
            value: item.value,
            mode: item.mode,
            timeout: item.timeout,
            last_accessed: item.last_accessed,
        }
    }

    /// Flatten into the underlying item shape under the given string id.
    fn into_underlying(self, id: String) -> CacheItem<V> {
        CacheItem {
            key: id,
            region: self.region,
            value: self.value,
            mode: self.mode,
            timeout: self.timeout,
            last_accessed: self.last_accessed,
        }
    }
}

/// Typed-key, typed-value cache over an injected string-keyed store.
///
/// # Example
///
/// ```
/// # use sqlstash::{MemoryStore, TypedCache};
/// # use sqlstash::Result;
/// # fn example() -> Result<()> {
/// let cache: TypedCache<i64, String, _> = TypedCache::new(MemoryStore::new());
/// cache.put(&1, "one".to_string())?;
/// assert_eq!(cache.get(&1)?, Some("one".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct TypedCache<K, V, C> {
    store: C,
    // Single-slot memo of the last translated key. Bounded and synchronized;
    // purely a read-path shortcut for repeated operations on one key.
    key_memo: Mutex<Option<(K, String)>>,
    _value: PhantomData<fn() -> V>,
}

impl<K, V, C> TypedCache<K, V, C>
where
    K: Serialize + DeserializeOwned + PartialEq + Clone,
    C: CacheStore<V>,
{
    /// Wrap a string-keyed store.
    pub fn new(store: C) -> Self {
        TypedCache {
            store,
            key_memo: Mutex::new(None),
            _value: PhantomData,
        }
    }

    /// Translate a typed key into its opaque string id:
    /// `base64(serialize(key))`.
    ///
    /// # Errors
    /// Returns `Error::Serialization` when the key cannot be encoded.
    pub fn key_to_string(&self, key: &K) -> Result<String> {
        {
            let memo = self.key_memo.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((cached_key, cached_id)) = memo.as_ref() {
                if cached_key == key {
                    return Ok(cached_id.clone());
                }
            }
        }

        let id = general_purpose::STANDARD.encode(serialization::serialize(key)?);
        let mut memo = self.key_memo.lock().unwrap_or_else(|e| e.into_inner());
        *memo = Some((key.clone(), id.clone()));
        Ok(id)
    }

    /// Decode an opaque string id back into the typed key.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` on malformed base64 and
    /// `Error::Deserialization` when the bytes do not decode as `K`.
    pub fn string_to_key(&self, id: &str) -> Result<K> {
        let bytes = general_purpose::STANDARD
            .decode(id)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        serialization::deserialize(&bytes)
    }

    /// Fetch the value stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.get_in_region(key, None)
    }

    /// Region-scoped variant of [`get`](Self::get); failure conditions pass
    /// through from the underlying store.
    pub fn get_in_region(&self, key: &K, region: Option<&str>) -> Result<Option<V>> {
        let id = self.key_to_string(key)?;
        Ok(self.store.get(&id, region)?.map(|item| item.value))
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub fn put(&self, key: &K, value: V) -> Result<()> {
        self.put_item(TypedCacheItem::new(key.clone(), value))
    }

    /// [`put`](Self::put) with explicit expiration.
    pub fn put_with_expiration(
        &self,
        key: &K,
        value: V,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        self.put_item(TypedCacheItem::with_expiration(
            key.clone(),
            value,
            mode,
            timeout,
        ))
    }

    /// Region-scoped variant of [`put`](Self::put); failure conditions pass
    /// through from the underlying store.
    pub fn put_in_region(&self, key: &K, value: V, region: Option<&str>) -> Result<()> {
        let mut item = TypedCacheItem::new(key.clone(), value);
        if let Some(region) = region {
            item = item.in_region(region);
        }
        self.put_item(item)
    }

    /// Store `value` under `key` only if no live entry exists.
    pub fn add(&self, key: &K, value: V) -> Result<bool> {
        self.add_item(TypedCacheItem::new(key.clone(), value))
    }

    /// [`add`](Self::add) with explicit expiration.
    pub fn add_with_expiration(
        &self,
        key: &K,
        value: V,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<bool> {
        self.add_item(TypedCacheItem::with_expiration(
            key.clone(),
            value,
            mode,
            timeout,
        ))
    }

    /// Region-scoped variant of [`add`](Self::add); failure conditions pass
    /// through from the underlying store.
    pub fn add_in_region(&self, key: &K, value: V, region: Option<&str>) -> Result<bool> {
        let mut item = TypedCacheItem::new(key.clone(), value);
        if let Some(region) = region {
            item = item.in_region(region);
        }
        self.add_item(item)
    }

    /// True iff a live entry exists under `key`.
    pub fn exists(&self, key: &K) -> Result<bool> {
        self.exists_in_region(key, None)
    }

    /// Region-scoped variant of [`exists`](Self::exists).
    pub fn exists_in_region(&self, key: &K, region: Option<&str>) -> Result<bool> {
        let id = self.key_to_string(key)?;
        self.store.exists(&id, region)
    }

    /// Delete the entry under `key`. True iff an entry existed.
    pub fn remove(&self, key: &K) -> Result<bool> {
        self.remove_in_region(key, None)
    }

    /// Region-scoped variant of [`remove`](Self::remove).
    pub fn remove_in_region(&self, key: &K, region: Option<&str>) -> Result<bool> {
        let id = self.key_to_string(key)?;
        self.store.remove(&id, region)
    }

    /// Delete every entry in the underlying store.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Number of live entries in the underlying store.
    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Fetch the full item under `key`, with its expiration metadata.
    ///
    /// The caller already supplied the typed key, so it is reused directly
    /// instead of being decoded back out of the string id.
    pub fn get_cache_item(&self, key: &K) -> Result<Option<TypedCacheItem<K, V>>> {
        let id = self.key_to_string(key)?;
        Ok(self
            .store
            .get(&id, None)?
            .map(|item| TypedCacheItem::from_underlying(key.clone(), item)))
    }

    /// Rebuild a typed item from an underlying one whose typed key is not at
    /// hand, decoding the string id. Used by host-side generic dispatch.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` / `Error::Deserialization` when the id
    /// does not decode back into `K`.
    pub fn item_from_underlying(&self, item: CacheItem<V>) -> Result<TypedCacheItem<K, V>> {
        let key = self.string_to_key(&item.key)?;
        Ok(TypedCacheItem::from_underlying(key, item))
    }

    /// Insert-if-absent with a fully populated item.
    pub fn add_item(&self, item: TypedCacheItem<K, V>) -> Result<bool> {
        let id = self.key_to_string(&item.key)?;
        self.store.add(item.into_underlying(id))
    }

    /// Upsert with a fully populated item.
    pub fn put_item(&self, item: TypedCacheItem<K, V>) -> Result<()> {
        let id = self.key_to_string(&item.key)?;
        self.store.put(item.into_underlying(id))
    }

    /// Underlying store reference (for advanced use).
    pub fn store(&self) -> &C {
        &self.store
    }
}
