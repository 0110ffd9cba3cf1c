use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;
use crate::types::{Listing, DEFAULT_MAX_KEYS};

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Keys are kept sorted so listings come
/// out in the same order a real object store returns them. Two test hooks
/// are provided: a configurable page size to exercise truncated listings,
/// and per-key read failures to exercise backend faults.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    failing_reads: RwLock<HashSet<String>>,
    max_keys: usize,
}

impl InMemoryObjectStore {
    /// Create a new empty store with the default page size.
    pub fn new() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }

    /// Create a new empty store returning at most `max_keys` entries per
    /// listing.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            failing_reads: RwLock::new(HashSet::new()),
            max_keys,
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Insert an object synchronously (test setup).
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.into(), data.into());
    }

    /// Make every subsequent read of `key` fail with a backend error.
    pub fn fail_reads_of(&self, key: impl Into<String>) {
        self.failing_reads
            .write()
            .expect("lock poisoned")
            .insert(key.into());
    }

    fn check_read(&self, key: &str) -> StoreResult<()> {
        if self.failing_reads.read().expect("lock poisoned").contains(key) {
            return Err(StoreError::Backend {
                key: key.to_string(),
                reason: "injected read failure".into(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> StoreResult<Listing> {
        let map = self.objects.read().expect("lock poisoned");
        let keys = map
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .map(|(k, _)| k.as_str())
            .take_while(|k| k.starts_with(prefix));
        Ok(Listing::paginate(keys, prefix, delimiter, self.max_keys))
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.check_read(key)?;
        let map = self.objects.read().expect("lock poisoned");
        map.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn seeded() -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        store.insert("github.com/yuuki/droot/20171015152508/meta.yml", "binaries: []\n");
        store.insert("github.com/yuuki/droot/20171015152508/droot", "droot-body");
        store.insert("github.com/yuuki/droot/20171016152508/meta.yml", "binaries: []\n");
        store.insert("github.com/yuuki/grabeni/20171016152508/meta.yml", "binaries: []\n");
        store
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryObjectStore::new();
        store.put("a/b", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = InMemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"one")).await.unwrap();
        store.put("k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = seeded();
        let key = "github.com/yuuki/droot/20171015152508/droot";
        store.delete(key).await.unwrap();
        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn list_with_delimiter() {
        let store = seeded();
        let page = store.list("github.com/yuuki/", Some("/")).await.unwrap();
        assert_eq!(
            page.common_prefixes,
            vec!["github.com/yuuki/droot/", "github.com/yuuki/grabeni/"]
        );
        assert!(page.keys.is_empty());
    }

    #[tokio::test]
    async fn list_recursive() {
        let store = seeded();
        let page = store
            .list("github.com/yuuki/droot/20171015152508", None)
            .await
            .unwrap();
        assert_eq!(page.keys.len(), 2);
    }

    #[tokio::test]
    async fn small_pages_truncate() {
        let store = InMemoryObjectStore::with_max_keys(1);
        store.insert("p/a", "1");
        store.insert("p/b", "2");
        let page = store.list("p/", None).await.unwrap();
        assert_eq!(page.keys, vec!["p/a"]);
        assert!(page.truncated);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_backend_error() {
        let store = seeded();
        let key = "github.com/yuuki/droot/20171015152508/droot";
        store.fail_reads_of(key);
        assert!(matches!(
            store.get(key).await.unwrap_err(),
            StoreError::Backend { .. }
        ));
        assert!(store.open_read(key).await.is_err());
    }

    #[tokio::test]
    async fn streaming_roundtrip_uses_defaults() {
        let store = InMemoryObjectStore::new();
        let written = store
            .upload("bin/tool", Box::new(std::io::Cursor::new(b"payload".to_vec())))
            .await
            .unwrap();
        assert_eq!(written, 7);

        let mut out = Vec::new();
        store
            .open_read("bin/tool")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"payload");
    }
}
