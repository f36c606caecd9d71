//! End-to-end scenarios over a SQLite-backed typed cache.

use rand::distr::Alphanumeric;
use rand::{rng, Rng};
use sqlstash::{
    CacheStore, ExpirationMode, SqliteConfig, SqliteStore, TypedCache, TypedCacheItem,
};
use std::time::Duration;
use tempfile::TempDir;

/// Surface the store's logging during test runs via RUST_LOG.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open_cache<K, V>(dir: &TempDir) -> TypedCache<K, V, SqliteStore<V>>
where
    K: serde::Serialize + serde::de::DeserializeOwned + PartialEq + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    init_logging();
    let store = SqliteStore::open(SqliteConfig::at(dir.path().join("cache.db")))
        .expect("Failed to open store");
    TypedCache::new(store)
}

#[test]
fn test_add_exists_get_scenario() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<i64, String, _> = open_cache(&dir);

    assert!(cache.add(&1, "a".to_string()).expect("add"));
    assert!(cache.exists(&1).expect("exists"));
    assert_eq!(cache.get(&1).expect("get"), Some("a".to_string()));
    assert!(!cache.add(&1, "b".to_string()).expect("add"));
    assert_eq!(cache.get(&1).expect("get"), Some("a".to_string()));
}

#[test]
fn test_put_replace_scenario() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<i64, String, _> = open_cache(&dir);

    cache.put(&2, "x".to_string()).expect("put");
    cache.put(&2, "y".to_string()).expect("put");
    assert_eq!(cache.get(&2).expect("get"), Some("y".to_string()));
}

#[test]
fn test_absolute_expiration_end_to_end() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<i64, String, _> = open_cache(&dir);

    cache
        .put_with_expiration(
            &7,
            "fleeting".to_string(),
            ExpirationMode::Absolute,
            Duration::from_millis(100),
        )
        .expect("put");
    assert!(cache.exists(&7).expect("exists"));

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(cache.get(&7).expect("get"), None);
    assert!(!cache.exists(&7).expect("exists"));
}

#[test]
fn test_clear_resets_everything() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<i64, String, _> = open_cache(&dir);

    for k in 0..10 {
        cache.put(&k, format!("v{}", k)).expect("put");
    }
    assert_eq!(cache.count().expect("count"), 10);

    cache.clear().expect("clear");
    assert_eq!(cache.count().expect("count"), 0);
    for k in 0..10 {
        assert!(!cache.exists(&k).expect("exists"));
    }
}

#[test]
fn test_values_survive_reopen() {
    init_logging();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("cache.db");

    {
        let store = SqliteStore::open(SqliteConfig::at(&path)).expect("open");
        let cache: TypedCache<String, u64, _> = TypedCache::new(store);
        cache.put(&"alpha".to_string(), 1).expect("put");
        cache.put(&"beta".to_string(), 2).expect("put");
        cache.store().close().expect("close");
    }

    let store = SqliteStore::open(SqliteConfig::at(&path)).expect("reopen");
    let cache: TypedCache<String, u64, _> = TypedCache::new(store);
    assert_eq!(cache.get(&"alpha".to_string()).expect("get"), Some(1));
    assert_eq!(cache.get(&"beta".to_string()).expect("get"), Some(2));
}

#[test]
fn test_typed_item_round_trip_with_region_rejection() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<i64, String, _> = open_cache(&dir);

    let item = TypedCacheItem::with_expiration(
        11,
        "scoped".to_string(),
        ExpirationMode::Absolute,
        Duration::from_secs(30),
    )
    .in_region("eu");
    assert!(cache.add_item(item).is_err());

    assert!(cache
        .add_item(TypedCacheItem::new(11, "unscoped".to_string()))
        .expect("add_item"));
    let fetched = cache.get_cache_item(&11).expect("get").expect("item");
    assert_eq!(fetched.key, 11);
    assert_eq!(fetched.value, "unscoped");
}

#[test]
fn test_bulk_generated_keys_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<String, i64, _> = open_cache(&dir);

    let mut rng = rng();
    let keys: Vec<String> = (0..28_000)
        .map(|i| {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            format!("key-{}-{}", i, suffix)
        })
        .collect();

    for (i, key) in keys.iter().enumerate() {
        cache.put(key, i as i64).expect("put");
    }
    assert_eq!(cache.count().expect("count"), 28_000);

    for (i, key) in keys.iter().enumerate() {
        let item = cache
            .get_cache_item(key)
            .expect("get_cache_item")
            .expect("item must exist");
        assert_eq!(item.value, i as i64);
        assert_eq!(&item.key, key);
    }
}

#[test]
fn test_facade_over_raw_store_ids() {
    // The facade and a direct store client must agree on the id encoding.
    let dir = TempDir::new().expect("tempdir");
    let cache: TypedCache<u32, String, _> = open_cache(&dir);

    cache.put(&77, "shared".to_string()).expect("put");
    let id = cache.key_to_string(&77).expect("encode");
    let raw = cache.store().get(&id, None).expect("get").expect("row");
    assert_eq!(raw.value, "shared");
    assert_eq!(cache.string_to_key(&id).expect("decode"), 77);
}
