//! Storage workload: randomized ranged reads and whole-object writes against an object store.
//!
//! The workload looks up the size of every candidate key once, then performs a fixed number of
//! iterations. Each iteration is either a read of `chunk_size` bytes at a random offset of a
//! random existing key, or a write of `chunk_size` random bytes under a generated key. The
//! `read_write` ratio is the probability of choosing a read.
//!
//! Every iteration is best-effort: failures are logged and counted, and the loop carries on.

use std::collections::HashMap;
use std::error::Error;

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TaskError, TaskResult};
use crate::store::{ByteRange, Connector, DEFAULT_REGION, ObjectStore, Secret, StoreConfig};

/// Parameters of a storage stress task.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IoTask {
    /// Endpoint of the object store.
    pub endpoint_url: String,
    /// Access key id.
    #[serde(rename = "keyId")]
    pub key_id: String,
    /// Secret access key.
    pub key: Secret,
    /// Existing objects that reads pick from.
    pub keys: Vec<String>,
    /// Number of operations to perform.
    #[serde(rename = "itterations")]
    pub iterations: u64,
    /// Bucket holding both the existing and the generated objects.
    pub bucket: String,
    /// Probability of a read, in `[0, 1]`.
    pub read_write: f64,
    /// Bytes per read and per write.
    pub chunk_size: u64,
    /// Signing region, defaults to [`DEFAULT_REGION`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Disables TLS when set to `"true"`.
    #[serde(
        rename = "disableSSL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_ssl: Option<Flag>,
    /// Enables path-style bucket addressing when set to `"true"`.
    #[serde(
        rename = "S3PathStyle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub path_style: Option<Flag>,
}

impl IoTask {
    /// Decodes a task from the `IO` entry of a job descriptor.
    pub fn from_value(value: &Value) -> TaskResult<Self> {
        Self::deserialize(value).map_err(|cause| TaskError::Decode { kind: "io", cause })
    }

    /// Connection settings for the store named by this task.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoint: self.endpoint_url.clone(),
            access_key_id: self.key_id.clone(),
            secret_key: self.key.clone(),
            region: self
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            tls: !self.disable_ssl.as_ref().is_some_and(Flag::is_set),
            path_style: self.path_style.as_ref().is_some_and(Flag::is_set),
        }
    }
}

/// A boolean switch that arrives either as a JSON boolean or as a string.
///
/// Strings count as set when they equal `"true"`, ignoring case and surrounding whitespace.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(value) => *value,
            Flag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Bool(value)
    }
}

/// Totals of a storage workload run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IoStats {
    /// Bytes returned by ranged reads.
    pub reads: i64,
    /// Bytes successfully written.
    pub writes: i64,
    /// Failed operations.
    pub errors: i64,
}

impl IoStats {
    /// Result reported when the task is missing or incomplete.
    pub const INVALID: IoStats = IoStats {
        reads: -1,
        writes: -1,
        errors: 1,
    };

    fn record(mut self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Read(bytes) => self.reads += bytes as i64,
            Outcome::Written(bytes) => self.writes += bytes as i64,
            Outcome::Failed => self.errors += 1,
        }
        self
    }
}

/// Result of a single iteration.
#[derive(Clone, Copy, Debug)]
enum Outcome {
    Read(u64),
    Written(u64),
    Failed,
}

/// Randomized contents of an object.
///
/// The same seed always produces the same bytes.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The length of the payload in bytes.
    pub len: u64,
    /// The RNG used to fill the payload with random bytes.
    pub rng: SmallRng,
}

impl Payload {
    pub fn new(len: u64, seed: u64) -> Self {
        Self {
            len,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Materializes the payload.
    pub fn into_bytes(mut self) -> Bytes {
        let mut buf = vec![0; self.len as usize];
        self.rng.fill_bytes(&mut buf);
        Bytes::from(buf)
    }
}

/// Name of the object written in the given iteration.
pub fn generated_key(iteration: u64) -> String {
    format!("generated_{iteration}.bin")
}

/// Decodes a storage task, connects to its store and runs it.
///
/// Returns [`IoStats::INVALID`] if the task is absent, misses a required field, or the store
/// client cannot be built.
pub async fn run(task: Option<&Value>, connector: &dyn Connector) -> IoStats {
    let Some(value) = task else {
        tracing::error!("no io task given");
        return IoStats::INVALID;
    };

    let task = match IoTask::from_value(value) {
        Ok(task) => task,
        Err(error) => {
            tracing::error!(error = &error as &dyn Error, "rejecting io task");
            return IoStats::INVALID;
        }
    };

    let store = match connector.connect(&task.store_config()) {
        Ok(store) => store,
        Err(error) => {
            tracing::error!(
                error = &error as &dyn Error,
                endpoint = task.endpoint_url.as_str(),
                "failed to create object store client"
            );
            return IoStats::INVALID;
        }
    };

    run_task(&task, store.as_ref()).await
}

/// Runs a decoded storage task against the given store.
pub async fn run_task(task: &IoTask, store: &dyn ObjectStore) -> IoStats {
    let sizes = lookup_sizes(store, &task.bucket, &task.keys).await;
    let mut rng = SmallRng::from_rng(&mut rand::rng());

    tracing::debug!(
        store = store.name(),
        bucket = task.bucket.as_str(),
        keys = task.keys.len(),
        known_sizes = sizes.len(),
        iterations = task.iterations,
        "starting io workload"
    );

    let mut stats = IoStats::default();
    for iteration in 0..task.iterations {
        let outcome = if rng.random::<f64>() < task.read_write {
            read_chunk(store, task, &sizes, &mut rng).await
        } else {
            write_chunk(store, task, iteration, &mut rng).await
        };
        stats = stats.record(outcome);
    }

    tracing::debug!(?stats, "io workload finished");
    stats
}

/// Looks up the size of every key. Keys whose lookup fails are left out of the table.
async fn lookup_sizes(
    store: &dyn ObjectStore,
    bucket: &str,
    keys: &[String],
) -> HashMap<String, u64> {
    let mut sizes = HashMap::with_capacity(keys.len());
    for key in keys {
        match store.head_object(bucket, key).await {
            Ok(size) => {
                sizes.insert(key.clone(), size);
            }
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn Error,
                    code = %error.code(),
                    key = key.as_str(),
                    "failed to get key"
                );
            }
        }
    }
    sizes
}

async fn read_chunk(
    store: &dyn ObjectStore,
    task: &IoTask,
    sizes: &HashMap<String, u64>,
    rng: &mut SmallRng,
) -> Outcome {
    let Some(key) = task.keys.choose(rng) else {
        tracing::error!("no keys to read from");
        return Outcome::Failed;
    };

    let Some(&size) = sizes.get(key) else {
        tracing::error!(key = key.as_str(), "failed to read, object size unknown");
        return Outcome::Failed;
    };

    let Some(max_start) = size.checked_sub(task.chunk_size) else {
        tracing::error!(
            key = key.as_str(),
            size,
            chunk_size = task.chunk_size,
            "failed to read, object smaller than chunk"
        );
        return Outcome::Failed;
    };

    if task.chunk_size == 0 {
        return Outcome::Read(0);
    }

    let range = ByteRange::new(rng.random_range(0..=max_start), task.chunk_size);
    match store.get_object_range(&task.bucket, key, range).await {
        Ok(bytes) => Outcome::Read(bytes.len() as u64),
        Err(error) => {
            tracing::error!(
                error = &error as &dyn Error,
                code = %error.code(),
                key = key.as_str(),
                %range,
                "failed to get"
            );
            Outcome::Failed
        }
    }
}

async fn write_chunk(
    store: &dyn ObjectStore,
    task: &IoTask,
    iteration: u64,
    rng: &mut SmallRng,
) -> Outcome {
    let key = generated_key(iteration);
    let payload = Payload::new(task.chunk_size, rng.next_u64()).into_bytes();

    match store.put_object(&task.bucket, &key, payload).await {
        Ok(()) => Outcome::Written(task.chunk_size),
        Err(error) => {
            tracing::error!(
                error = &error as &dyn Error,
                code = %error.code(),
                key = key.as_str(),
                "failed to write"
            );
            Outcome::Failed
        }
    }
}
