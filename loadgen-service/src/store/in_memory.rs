//! In-memory store for tests and dry runs.
//!
//! This provides an [`ObjectStore`] backed by a `HashMap`, with switches to make every read or
//! every write fail. The store is [`Clone`] so tests can hold a handle for direct inspection
//! while the workload owns a boxed copy.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::{
    BoxedStore, ByteRange, Connector, ObjectStore, StoreConfig, StoreError, StoreResult,
};

type Objects = HashMap<(String, String), Bytes>;

#[derive(Debug, Default)]
struct Inner {
    objects: Mutex<Objects>,
    buckets: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_heads: AtomicBool,
    requests: AtomicU64,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object directly, bypassing the [`ObjectStore`] trait.
    pub fn with_object(self, bucket: &str, key: &str, payload: impl Into<Bytes>) -> Self {
        self.objects()
            .insert((bucket.to_owned(), key.to_owned()), payload.into());
        self
    }

    /// Makes every ranged read fail.
    pub fn failing_reads(self) -> Self {
        self.inner.fail_reads.store(true, Ordering::Relaxed);
        self
    }

    /// Makes every write and bucket creation fail.
    pub fn failing_writes(self) -> Self {
        self.inner.fail_writes.store(true, Ordering::Relaxed);
        self
    }

    /// Makes every metadata lookup fail.
    pub fn failing_heads(self) -> Self {
        self.inner.fail_heads.store(true, Ordering::Relaxed);
        self
    }

    /// Returns a clone of the stored bytes, if present.
    pub fn get_stored(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects().len()
    }

    /// Returns `true` if the store has no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of operations issued against this store, failed ones included.
    pub fn requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, Objects> {
        // A poisoned map only means another test thread panicked mid-insert.
        self.inner
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn count_request(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<u64> {
        self.count_request();
        if self.inner.fail_heads.load(Ordering::Relaxed) {
            return Err(StoreError::Other("injected head failure".into()));
        }

        self.get_stored(bucket, key)
            .map(|bytes| bytes.len() as u64)
            .ok_or(StoreError::NotFound)
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> StoreResult<Bytes> {
        self.count_request();
        if self.inner.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Other("injected read failure".into()));
        }

        let bytes = self.get_stored(bucket, key).ok_or(StoreError::NotFound)?;
        let len = bytes.len() as u64;
        if range.start >= len {
            return Err(StoreError::Status(416));
        }

        let end = range.end().min(len - 1);
        Ok(bytes.slice(range.start as usize..=end as usize))
    }

    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> StoreResult<()> {
        self.count_request();
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Other("injected write failure".into()));
        }

        self.objects()
            .insert((bucket.to_owned(), key.to_owned()), payload);
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.count_request();
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Other("injected write failure".into()));
        }

        let mut buckets = self
            .inner
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if buckets.insert(bucket.to_owned()) {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists)
        }
    }
}

/// Hands out handles to one shared [`InMemoryStore`], ignoring the connection settings.
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnector {
    store: InMemoryStore,
}

impl InMemoryConnector {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }

    /// The shared store behind every connection.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

impl Connector for InMemoryConnector {
    fn connect(&self, _config: &StoreConfig) -> StoreResult<BoxedStore> {
        Ok(Box::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ranged_reads_are_clamped() {
        let store = InMemoryStore::new().with_object("b", "k", vec![7u8; 10]);

        let bytes = store
            .get_object_range("b", "k", ByteRange::new(4, 4))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 4);

        let bytes = store
            .get_object_range("b", "k", ByteRange::new(8, 4))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 2);

        let err = store
            .get_object_range("b", "k", ByteRange::new(10, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status(416)));
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = InMemoryStore::new()
            .with_object("b", "k", vec![0u8; 4])
            .failing_writes();

        assert_eq!(store.head_object("b", "k").await.unwrap(), 4);
        assert!(store.put_object("b", "x", Bytes::new()).await.is_err());
        assert!(store.get_stored("b", "x").is_none());
        assert_eq!(store.requests(), 2);

        let store = store.failing_heads();
        assert!(store.head_object("b", "k").await.is_err());
    }

    #[tokio::test]
    async fn buckets_are_created_once() {
        let store = InMemoryStore::new();

        store.create_bucket("b").await.unwrap();
        assert!(matches!(
            store.create_bucket("b").await,
            Err(StoreError::AlreadyExists)
        ));
        store.create_bucket("c").await.unwrap();
    }
}
