use std::fmt;

use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, BucketConfiguration, Region};

use super::{ByteRange, Connector, ObjectStore, StoreConfig, StoreError, StoreResult};

/// Connects to S3 and S3-compatible stores (MinIO, Ceph, ...) with static credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct S3Connector;

impl Connector for S3Connector {
    fn connect(&self, config: &StoreConfig) -> StoreResult<super::BoxedStore> {
        Ok(Box::new(S3Store::new(config)?))
    }
}

/// An [`ObjectStore`] speaking the S3 protocol.
///
/// Buckets are resolved per request, since the workload names the bucket on every operation.
pub struct S3Store {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3Store {
    /// Creates a new client for the given endpoint and credentials.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let credentials = Credentials::new(
            Some(config.access_key_id.as_str()),
            Some(config.secret_key.expose()),
            None,
            None,
            None,
        )?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: endpoint_url(&config.endpoint, config.tls),
        };

        Ok(Self {
            region,
            credentials,
            path_style: config.path_style,
        })
    }

    fn bucket(&self, name: &str) -> StoreResult<Box<Bucket>> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())?;
        if self.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(bucket)
    }
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("endpoint", &self.region.endpoint())
            .field("path_style", &self.path_style)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<u64> {
        let (head, status) = self.bucket(bucket)?.head_object(key).await?;
        StoreError::check_status(status)?;

        let length = head.content_length.ok_or(StoreError::MissingLength)?;
        u64::try_from(length).map_err(|_| StoreError::MissingLength)
    }

    #[tracing::instrument(level = "trace", skip(self), fields(%range))]
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> StoreResult<Bytes> {
        let response = self
            .bucket(bucket)?
            .get_object_range(key, range.start, Some(range.end()))
            .await?;
        StoreError::check_status(response.status_code())?;

        Ok(Bytes::from(response.to_vec()))
    }

    #[tracing::instrument(level = "trace", skip(self, payload), fields(len = payload.len()))]
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> StoreResult<()> {
        let response = self.bucket(bucket)?.put_object(key, &payload).await?;
        StoreError::check_status(response.status_code())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let region = self.region.clone();
        let credentials = self.credentials.clone();
        let config = BucketConfiguration::default();

        let result = if self.path_style {
            Bucket::create_with_path_style(bucket, region, credentials, config).await
        } else {
            Bucket::create(bucket, region, credentials, config).await
        };

        match result {
            Ok(response) if response.response_code == 409 => Err(StoreError::AlreadyExists),
            Ok(response) => StoreError::check_status(response.response_code),
            Err(S3Error::HttpFailWithBody(409, _)) => Err(StoreError::AlreadyExists),
            Err(error) => Err(error.into()),
        }
    }
}

/// Normalizes the endpoint scheme according to the TLS setting.
///
/// Endpoints without a scheme get one. An explicit `https://` is downgraded when TLS is disabled,
/// and an explicit `http://` is kept as given.
fn endpoint_url(endpoint: &str, tls: bool) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match endpoint.split_once("://") {
        Some(("https", host)) if !tls => format!("http://{host}"),
        Some(_) => endpoint.to_owned(),
        None if tls => format!("https://{endpoint}"),
        None => format!("http://{endpoint}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;

    #[test]
    fn endpoint_scheme_follows_tls() {
        assert_eq!(endpoint_url("minio:9000", true), "https://minio:9000");
        assert_eq!(endpoint_url("minio:9000", false), "http://minio:9000");
        assert_eq!(
            endpoint_url("https://s3.example.com/", false),
            "http://s3.example.com"
        );
        assert_eq!(
            endpoint_url("http://localhost:9000", true),
            "http://localhost:9000"
        );
    }

    #[test]
    fn builds_client_from_static_credentials() {
        let config = StoreConfig {
            endpoint: "localhost:9000".into(),
            access_key_id: "minio".into(),
            secret_key: Secret::from("minio123"),
            region: "us-east-1".into(),
            tls: false,
            path_style: true,
        };

        let store = S3Store::new(&config).unwrap();
        assert_eq!(store.region.endpoint(), "http://localhost:9000");
        assert!(store.bucket("bench").is_ok());

        let debug = format!("{store:?}");
        assert!(!debug.contains("minio123"));
    }
}
