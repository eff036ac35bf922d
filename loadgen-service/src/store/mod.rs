//! Object-store client abstraction exercised by the I/O workload.
//!
//! The workload only needs three operations: a metadata lookup to learn an object's size, a
//! byte-range read and a whole-object write. [`ObjectStore`] captures exactly those, and a
//! [`Connector`] builds a store from the connection settings found in an I/O task.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod in_memory;
mod s3_compatible;

pub use in_memory::{InMemoryConnector, InMemoryStore};
pub use s3_compatible::{S3Connector, S3Store};

/// Region used when an I/O task does not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// A type-erased [`ObjectStore`] instance.
pub type BoxedStore = Box<dyn ObjectStore>;

/// Result type for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait::async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the size of the object in bytes.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<u64>;

    /// Reads the given byte range of an object.
    ///
    /// The returned buffer may be shorter than the requested range if the object ends early.
    async fn get_object_range(&self, bucket: &str, key: &str, range: ByteRange)
    -> StoreResult<Bytes>;

    /// Stores or overwrites an object.
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> StoreResult<()>;

    /// Creates a bucket. Returns [`StoreError::AlreadyExists`] if it is already there.
    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;
}

/// Builds [`ObjectStore`] clients from connection settings.
pub trait Connector: fmt::Debug + Send + Sync {
    /// Creates a new store client for the given settings.
    fn connect(&self, config: &StoreConfig) -> StoreResult<BoxedStore>;
}

/// Errors returned by object-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Errors from the S3 client, including network failures.
    #[error("s3 error: {0}")]
    S3(#[from] s3::error::S3Error),

    /// The static credentials could not be turned into a signing configuration.
    #[error("credentials error: {0}")]
    Credentials(#[from] s3::creds::error::CredentialsError),

    /// The object does not exist.
    #[error("object not found")]
    NotFound,

    /// The bucket to create exists already.
    #[error("bucket already exists")]
    AlreadyExists,

    /// The store answered with a non-success status code.
    #[error("request failed with status {0}")]
    Status(u16),

    /// The metadata lookup did not report a content length.
    #[error("missing content length")]
    MissingLength,

    /// Failure injected or reported by a store without a more specific variant.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// A short error code for log lines, similar to the codes S3 reports.
    pub fn code(&self) -> String {
        match self {
            StoreError::S3(_) => "S3Error".to_owned(),
            StoreError::Credentials(_) => "InvalidCredentials".to_owned(),
            StoreError::NotFound => "NoSuchKey".to_owned(),
            StoreError::AlreadyExists => "BucketAlreadyOwnedByYou".to_owned(),
            StoreError::Status(status) => status.to_string(),
            StoreError::MissingLength => "MissingContentLength".to_owned(),
            StoreError::Other(_) => "Other".to_owned(),
        }
    }

    /// Maps a response status to an error, passing success codes through.
    pub(crate) fn check_status(status: u16) -> StoreResult<()> {
        match status {
            200..=299 => Ok(()),
            404 => Err(StoreError::NotFound),
            status => Err(StoreError::Status(status)),
        }
    }
}

/// An inclusive byte range of `len` bytes starting at `start`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ByteRange {
    /// Offset of the first byte.
    pub start: u64,
    /// Number of bytes requested.
    pub len: u64,
}

impl ByteRange {
    pub fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Offset of the last requested byte.
    pub fn end(&self) -> u64 {
        self.start + self.len.saturating_sub(1)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end())
    }
}

/// Connection settings for an object store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Endpoint URL, with or without a scheme.
    pub endpoint: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_key: Secret,
    /// Signing region.
    pub region: String,
    /// Whether to talk to the endpoint over TLS.
    pub tls: bool,
    /// Whether to address buckets in the path instead of the host name.
    pub path_style: bool,
}

/// A string that is redacted from `Debug` output.
///
/// Used for credentials that travel inside job descriptors and configuration files.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[redacted]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_is_inclusive() {
        let range = ByteRange::new(100, 512);
        assert_eq!(range.end(), 611);
        assert_eq!(range.to_string(), "bytes=100-611");
    }

    #[test]
    fn secret_is_redacted() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{secret:?}"), "[redacted]");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn status_mapping() {
        assert!(StoreError::check_status(200).is_ok());
        assert!(StoreError::check_status(206).is_ok());
        assert!(matches!(
            StoreError::check_status(404),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            StoreError::check_status(403),
            Err(StoreError::Status(403))
        ));
        assert_eq!(StoreError::Status(503).code(), "503");
    }
}
