use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{StoreError, StoreResult};
use crate::types::Listing;

/// Boxed reader over an object's contents.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Flat key/value object store with S3-like semantics.
///
/// All implementations must satisfy these invariants:
/// - `get`/`open_read` on a missing key fail with [`StoreError::NotFound`].
/// - `put`/`upload` replace any existing object at the key.
/// - `delete` of a missing key succeeds.
/// - `list` returns a single page; `truncated` reports whether more exist.
/// - Listing may lag behind writes on eventually consistent services;
///   callers must tolerate that.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List keys beginning with `prefix`, collapsing subtrees on `delimiter`.
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> StoreResult<Listing>;

    /// Read a whole object into memory.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Write a whole object.
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// Remove an object.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open a streaming reader over an object.
    ///
    /// The default buffers the object with [`ObjectStore::get`]. Backends
    /// that can stream should override it.
    async fn open_read(&self, key: &str) -> StoreResult<ObjectReader> {
        let data = self.get(key).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    /// Stream `reader` into an object, returning the number of bytes stored.
    ///
    /// The default buffers the reader and calls [`ObjectStore::put`].
    async fn upload(&self, key: &str, mut reader: ObjectReader) -> StoreResult<u64> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;
        self.put(key, Bytes::from(buf)).await?;
        Ok(len)
    }
}
