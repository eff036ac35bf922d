//! The request/response wrapper around a single job.
//!
//! A job arrives as one JSON document and leaves as one response document shaped like a
//! serverless function result: `{"statusCode": 200, "body": "<json>"}`, where `body` holds the
//! serialized [`JobResponse`].

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use loadgen_service::store::{Connector, S3Connector};
use loadgen_service::{Dispatcher, JobResponse, Reporter, TracingReporter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code of every handler response. Invalid jobs are reported in the body.
pub const STATUS_OK: u16 = 200;

/// The response document of a handled job.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    /// The serialized [`JobResponse`].
    pub body: String,
}

impl HandlerResponse {
    pub fn new(response: &JobResponse) -> Result<Self> {
        Ok(Self {
            status_code: STATUS_OK,
            body: serde_json::to_string(response)?,
        })
    }
}

/// Runs jobs with the production collaborators: log-based reporting and S3 stores.
#[derive(Debug)]
pub struct Handler {
    dispatcher: Dispatcher,
}

impl Handler {
    pub fn new() -> Self {
        Self::with(Arc::new(TracingReporter::new()), Arc::new(S3Connector))
    }

    pub fn with(reporter: Arc<dyn Reporter>, connector: Arc<dyn Connector>) -> Self {
        Self {
            dispatcher: Dispatcher::new(reporter, connector),
        }
    }

    /// Dispatches one job and wraps its response.
    pub async fn handle(&self, job: &Value, context: &Value) -> Result<HandlerResponse> {
        let response = self.dispatcher.dispatch(job, context).await;
        HandlerResponse::new(&response)
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a job document from a reader, e.g. a file or stdin.
pub fn read_job(mut reader: impl Read) -> Result<Value> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .context("failed to read job")?;
    serde_json::from_str(&input).context("job is not valid JSON")
}

#[cfg(test)]
mod tests {
    use loadgen_service::RecordingReporter;
    use loadgen_service::store::InMemoryConnector;
    use serde_json::json;

    use super::*;

    fn handler() -> Handler {
        Handler::with(
            Arc::new(RecordingReporter::new()),
            Arc::new(InMemoryConnector::default()),
        )
    }

    #[tokio::test]
    async fn wraps_completed_jobs() {
        let response = handler()
            .handle(&json!({"prime": 13}), &json!("ctx"))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["message"], "test done");
        assert_eq!(body["details"], json!(["job=prime", "probable_prime=true"]));
    }

    #[tokio::test]
    async fn wraps_invalid_jobs() {
        let response = handler()
            .handle(&json!({"nothing": 1}), &Value::Null)
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"error":"job not defined correctly"}"#);
    }

    #[test]
    fn serializes_camel_case() {
        let response = HandlerResponse {
            status_code: STATUS_OK,
            body: "{}".into(),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"statusCode": 200, "body": "{}"})
        );
    }

    #[test]
    fn reads_jobs() {
        let job = read_job(r#"{"idle": 1}"#.as_bytes()).unwrap();
        assert_eq!(job, json!({"idle": 1}));
        assert!(read_job("not json".as_bytes()).is_err());
    }
}
