//! Creates the objects that storage workloads read from.

use std::error::Error;

use crate::store::{ObjectStore, StoreError};
use crate::workload::io::Payload;

/// Outcome of a seeding run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SeedReport {
    /// Objects written successfully.
    pub written: u64,
    /// Objects that failed to write.
    pub errors: u64,
}

/// Creates `bucket` if needed, then writes one random object of `size` bytes for every key.
///
/// A bucket that exists already is fine. Any other bucket failure is logged and the writes are
/// attempted anyway. Write failures are logged and counted; the remaining keys are still written.
pub async fn seed_objects(
    store: &dyn ObjectStore,
    bucket: &str,
    keys: &[String],
    size: u64,
) -> SeedReport {
    match store.create_bucket(bucket).await {
        Ok(()) => tracing::info!(bucket, "created bucket"),
        Err(StoreError::AlreadyExists) => tracing::debug!(bucket, "bucket exists"),
        Err(error) => tracing::warn!(
            error = &error as &dyn Error,
            code = %error.code(),
            bucket,
            "failed to create bucket"
        ),
    }

    let mut report = SeedReport::default();

    for (index, key) in keys.iter().enumerate() {
        let payload = Payload::new(size, index as u64).into_bytes();
        match store.put_object(bucket, key, payload).await {
            Ok(()) => {
                tracing::debug!(key = key.as_str(), size, "seeded object");
                report.written += 1;
            }
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn Error,
                    key = key.as_str(),
                    "failed to seed object"
                );
                report.errors += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn writes_every_key() {
        let store = InMemoryStore::new();
        let keys = vec!["in_a_0.bin".to_owned(), "in_a_1.bin".to_owned()];

        let report = seed_objects(&store, "set", &keys, 128).await;

        assert_eq!(report, SeedReport { written: 2, errors: 0 });
        assert_eq!(store.get_stored("set", "in_a_1.bin").unwrap().len(), 128);
    }

    #[tokio::test]
    async fn counts_failures() {
        let store = InMemoryStore::new().failing_writes();
        let keys = vec!["k".to_owned(); 3];

        let report = seed_objects(&store, "set", &keys, 1).await;

        assert_eq!(report, SeedReport { written: 0, errors: 3 });
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn creates_the_bucket_first() {
        let store = InMemoryStore::new();
        let keys = vec!["k".to_owned()];

        seed_objects(&store, "fresh", &keys, 4).await;

        // bucket creation plus one write
        assert_eq!(store.requests(), 2);
        assert!(matches!(
            store.create_bucket("fresh").await,
            Err(StoreError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn existing_bucket_is_reused() {
        let store = InMemoryStore::new();
        let keys = vec!["a".to_owned(), "b".to_owned()];

        seed_objects(&store, "set", &keys, 4).await;
        let report = seed_objects(&store, "set", &keys, 8).await;

        assert_eq!(report, SeedReport { written: 2, errors: 0 });
        assert_eq!(store.get_stored("set", "a").unwrap().len(), 8);
    }
}
