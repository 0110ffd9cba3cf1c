use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectReader, ObjectStore};
use crate::types::{Listing, DEFAULT_MAX_KEYS};

/// Directory under the root holding in-flight writes. Never listed.
const TMP_DIR: &str = ".binrep-tmp";

/// Object store mapping each key onto a file below a root directory.
///
/// `a/b/c` is stored at `<root>/a/b/c`. Writes land in a staging file and are
/// renamed into place, so readers never observe a partially written object.
/// Directories left empty by a delete are removed up to the root.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    max_keys: usize,
    tmp_seq: AtomicU64,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened filesystem object store");
        Ok(Self {
            root,
            max_keys: DEFAULT_MAX_KEYS,
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Return at most `max_keys` entries per listing.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn staging_path(&self) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(TMP_DIR)
            .join(format!("{}-{seq}", std::process::id()))
    }

    /// Move a fully written staging file to the object path.
    async fn commit(&self, staging: &Path, key: &str) -> StoreResult<()> {
        let dest = self.object_path(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::rename(staging, &dest).await {
            let _ = tokio::fs::remove_file(staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Collect every key below the directory that contains `prefix`.
    async fn collect_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let base = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "",
        };
        let root = self.root.clone();
        let base_dir = self.root.join(base);
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || walk_keys(&root, &base_dir, &prefix))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }

    /// Remove empty directories from the parent of `key` up to the root.
    async fn prune_empty_parents(&self, key: &str) {
        let mut dir = Path::new(key).parent();
        while let Some(rel) = dir.filter(|d| !d.as_os_str().is_empty()) {
            // Fails on the first non-empty directory.
            if tokio::fs::remove_dir(self.root.join(rel)).await.is_err() {
                break;
            }
            dir = rel.parent();
        }
    }
}

/// Keys of every regular file below `base_dir` that start with `prefix`,
/// sorted. The staging directory is skipped.
fn walk_keys(root: &Path, base_dir: &Path, prefix: &str) -> StoreResult<Vec<String>> {
    if !base_dir.is_dir() {
        return Ok(Vec::new());
    }
    let staging = root.join(TMP_DIR);
    let mut keys = Vec::new();

    let entries = WalkDir::new(base_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.path() != staging);
    for entry in entries {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let segments: Option<Vec<&str>> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        let Some(segments) = segments else {
            trace!(path = %entry.path().display(), "skipping non-UTF-8 entry");
            continue;
        };
        let key = segments.join("/");
        if key.starts_with(prefix) {
            keys.push(key);
        }
    }

    keys.sort();
    Ok(keys)
}

fn validate_key(key: &str) -> StoreResult<()> {
    let reason = if key.is_empty() {
        Some("key must not be empty")
    } else if key.starts_with('/') {
        Some("key must not start with '/'")
    } else if key.contains('\\') {
        Some("key must not contain '\\'")
    } else if key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        Some("key must not contain empty, '.' or '..' segments")
    } else if key == TMP_DIR || key.starts_with(&format!("{TMP_DIR}/")) {
        Some("key is reserved")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }),
        None => Ok(()),
    }
}

fn map_not_found(err: io::Error, key: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound {
            key: key.to_string(),
        }
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> StoreResult<Listing> {
        if prefix.starts_with('/') || prefix.split('/').any(|s| s == "..") {
            return Err(StoreError::InvalidKey {
                key: prefix.to_string(),
                reason: "prefix escapes the store root".into(),
            });
        }
        let keys = self.collect_keys(prefix).await?;
        Ok(Listing::paginate(
            keys.iter().map(String::as_str),
            prefix,
            delimiter,
            self.max_keys,
        ))
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.object_path(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| map_not_found(e, key))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        validate_key(key)?;
        let staging = self.staging_path();
        tokio::fs::create_dir_all(self.root.join(TMP_DIR)).await?;
        tokio::fs::write(&staging, &data).await?;
        self.commit(&staging, key).await?;
        trace!(key, size = data.len(), "stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_parents(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn open_read(&self, key: &str) -> StoreResult<ObjectReader> {
        let path = self.object_path(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| map_not_found(e, key))?;
        Ok(Box::new(file))
    }

    async fn upload(&self, key: &str, mut reader: ObjectReader) -> StoreResult<u64> {
        validate_key(key)?;
        let staging = self.staging_path();
        tokio::fs::create_dir_all(self.root.join(TMP_DIR)).await?;

        let copied = async {
            let mut file = tokio::fs::File::create(&staging).await?;
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, io::Error>(n)
        }
        .await;

        match copied {
            Ok(n) => {
                self.commit(&staging, key).await?;
                trace!(key, size = n, "uploaded object");
                Ok(n)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("repo")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let (_dir, store) = store().await;
        let key = "github.com/yuuki/droot/20171015152508/droot";
        store.put(key, Bytes::from_static(b"droot-body")).await.unwrap();

        assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"droot-body"));
        assert!(store.root().join(key).is_file());
        assert!(store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let (_dir, store) = store().await;
        assert!(store.get("a/b").await.unwrap_err().is_not_found());
        assert!(matches!(store.open_read("a/b").await, Err(e) if e.is_not_found()));
        assert!(!store.exists("a/b").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let (_dir, store) = store().await;
        for bad in ["", "/etc/passwd", "a/../b", "a//b", ".binrep-tmp/x"] {
            let err = store.put(bad, Bytes::new()).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{bad:?}");
        }
        assert!(store.list("../", None).await.is_err());
    }

    #[tokio::test]
    async fn listing_matches_s3_semantics() {
        let (_dir, store) = store().await;
        for key in [
            "github.com/yuuki/droot/20171015152508/meta.yml",
            "github.com/yuuki/droot/20171016152508/meta.yml",
            "github.com/yuuki/grabeni/20171016152508/meta.yml",
        ] {
            store.put(key, Bytes::from_static(b"binaries: []\n")).await.unwrap();
        }

        let page = store.list("github.com/yuuki/", Some("/")).await.unwrap();
        assert_eq!(
            page.common_prefixes,
            vec!["github.com/yuuki/droot/", "github.com/yuuki/grabeni/"]
        );

        let page = store.list("github.com/yuuki/dr", Some("/")).await.unwrap();
        assert_eq!(page.common_prefixes, vec!["github.com/yuuki/droot/"]);

        let page = store.list("", None).await.unwrap();
        assert_eq!(page.keys.len(), 3);
        assert!(page.keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn listing_walks_nested_directories() {
        let (_dir, store) = store().await;
        for key in ["a/b/c/d/one", "a/b/two", "a/x/three"] {
            store.put(key, Bytes::from_static(b"-")).await.unwrap();
        }

        let page = store.list("a/b/", None).await.unwrap();
        assert_eq!(page.keys, vec!["a/b/c/d/one", "a/b/two"]);

        let page = store.list("missing/dir/", Some("/")).await.unwrap();
        assert!(page.is_empty());
        assert!(!page.truncated);
    }

    #[tokio::test]
    async fn staging_area_is_hidden() {
        let (_dir, store) = store().await;
        store.put("a", Bytes::from_static(b"1")).await.unwrap();
        let page = store.list("", Some("/")).await.unwrap();
        assert_eq!(page.keys, vec!["a"]);
        assert!(page.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn delete_prunes_empty_directories() {
        let (_dir, store) = store().await;
        store.put("x/y/one", Bytes::from_static(b"1")).await.unwrap();
        store.put("x/two", Bytes::from_static(b"2")).await.unwrap();

        store.delete("x/y/one").await.unwrap();
        assert!(!store.root().join("x/y").exists());
        assert!(store.root().join("x").exists());

        store.delete("x/y/one").await.unwrap();
        assert!(store.list("x/", Some("/")).await.unwrap().common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn upload_streams_into_place() {
        let (_dir, store) = store().await;
        let n = store
            .upload("bin/tool", Box::new(std::io::Cursor::new(vec![7u8; 100_000])))
            .await
            .unwrap();
        assert_eq!(n, 100_000);

        let mut out = Vec::new();
        store
            .open_read("bin/tool")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out.len(), 100_000);
    }

    #[tokio::test]
    async fn page_size_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).await.unwrap().with_max_keys(2);
        for key in ["p/a", "p/b", "p/c"] {
            store.put(key, Bytes::from_static(b"-")).await.unwrap();
        }
        let page = store.list("p/", None).await.unwrap();
        assert_eq!(page.keys, vec!["p/a", "p/b"]);
        assert!(page.truncated);
    }
}
