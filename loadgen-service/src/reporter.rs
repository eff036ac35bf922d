//! Start/done reporting for jobs.
//!
//! The dispatcher announces every valid job before running it and reports its completion
//! afterwards. Whatever [`Reporter::report_done`] returns becomes the job's response.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher::JobKind;

/// Logged in place of credentials.
const REDACTED: &str = "[redacted]";

/// Receives job lifecycle events.
pub trait Reporter: fmt::Debug + Send + Sync {
    /// Called before the workload starts.
    fn report_start(&self, context: &Value, job: &Value);

    /// Called after the workload finished. The returned envelope is handed back to the caller.
    fn report_done(&self, context: &Value, message: &str, details: Vec<String>) -> ResultEnvelope;
}

/// Uniform completion acknowledgment of a job.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ResultEnvelope {
    /// Human readable status.
    pub message: String,
    /// Auxiliary `key=value` details about the workload.
    pub details: Vec<String>,
    /// The caller's execution context, passed through unchanged.
    pub context: Value,
    /// When the job was reported as started.
    #[serde(with = "humantime_serde", default)]
    pub started_at: Option<SystemTime>,
    /// Time between start and completion.
    #[serde(with = "humantime_serde", default)]
    pub elapsed: Option<Duration>,
}

/// Returns `job` with the secret access key of its storage task masked, for logging.
pub fn redact_credentials(job: &Value) -> Cow<'_, Value> {
    let pointer = format!("/{}/key", JobKind::Io.key());
    if job.pointer(&pointer).is_none() {
        return Cow::Borrowed(job);
    }

    let mut job = job.clone();
    if let Some(key) = job.pointer_mut(&pointer) {
        *key = Value::from(REDACTED);
    }
    Cow::Owned(job)
}

#[derive(Debug)]
struct Started {
    context: Value,
    at: SystemTime,
    instant: Instant,
}

/// Reports job start and completion as log events and measures the time in between.
///
/// Starts are matched to completions by their context, so one reporter can serve concurrent
/// jobs as long as their contexts differ.
#[derive(Debug, Default)]
pub struct TracingReporter {
    started: Mutex<Vec<Started>>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn started(&self) -> MutexGuard<'_, Vec<Started>> {
        self.started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reporter for TracingReporter {
    fn report_start(&self, context: &Value, job: &Value) {
        let job = redact_credentials(job);
        tracing::info!(%context, %job, "job started");
        self.started().push(Started {
            context: context.clone(),
            at: SystemTime::now(),
            instant: Instant::now(),
        });
    }

    fn report_done(&self, context: &Value, message: &str, details: Vec<String>) -> ResultEnvelope {
        let started = {
            let mut started = self.started();
            started
                .iter()
                .position(|s| &s.context == context)
                .map(|index| started.remove(index))
        };

        let elapsed = started.as_ref().map(|s| s.instant.elapsed());
        tracing::info!(%context, ?details, ?elapsed, "{message}");

        ResultEnvelope {
            message: message.to_owned(),
            details,
            context: context.clone(),
            started_at: started.map(|s| s.at),
            elapsed,
        }
    }
}

/// A recorded lifecycle event.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportEvent {
    Start {
        context: Value,
        job: Value,
    },
    Done {
        context: Value,
        message: String,
        details: Vec<String>,
    },
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events reported so far, oldest first.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ReportEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reporter for RecordingReporter {
    fn report_start(&self, context: &Value, job: &Value) {
        self.lock().push(ReportEvent::Start {
            context: context.clone(),
            job: job.clone(),
        });
    }

    fn report_done(&self, context: &Value, message: &str, details: Vec<String>) -> ResultEnvelope {
        self.lock().push(ReportEvent::Done {
            context: context.clone(),
            message: message.to_owned(),
            details: details.clone(),
        });

        ResultEnvelope {
            message: message.to_owned(),
            details,
            context: context.clone(),
            started_at: None,
            elapsed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tracing_reporter_matches_contexts() {
        let reporter = TracingReporter::new();
        reporter.report_start(&json!("a"), &json!({"idle": 0}));
        reporter.report_start(&json!("b"), &json!({"idle": 0}));

        let done = reporter.report_done(&json!("b"), "test done", vec!["job=idle".into()]);
        assert_eq!(done.context, json!("b"));
        assert!(done.started_at.is_some());
        assert!(done.elapsed.is_some());
        assert_eq!(reporter.started().len(), 1);

        let unknown = reporter.report_done(&json!("c"), "test done", vec![]);
        assert!(unknown.elapsed.is_none());
    }

    #[test]
    fn start_log_hides_storage_secret() {
        let capture = loadgen_test::tracing::LogCapture::start();
        let reporter = TracingReporter::new();
        let job = json!({"IO": {"keyId": "minio", "key": "minio123", "bucket": "set"}});

        reporter.report_start(&json!("ctx"), &job);

        let output = capture.output();
        assert!(output.contains("job started"), "{output}");
        assert!(output.contains("[redacted]"), "{output}");
        assert!(output.contains("minio"), "{output}");
        assert!(!output.contains("minio123"), "{output}");
    }

    #[test]
    fn redaction_leaves_other_jobs_alone() {
        let job = json!({"prime": 7, "key": "top-level"});
        assert!(matches!(redact_credentials(&job), Cow::Borrowed(_)));

        let job = json!({"IO": {"key": "minio123", "keys": ["a.bin"]}});
        let redacted = redact_credentials(&job);
        assert_eq!(redacted["IO"]["key"], "[redacted]");
        assert_eq!(redacted["IO"]["keys"], json!(["a.bin"]));
        assert_eq!(job["IO"]["key"], "minio123");
    }

    #[test]
    fn envelope_serializes_durations() {
        let envelope = ResultEnvelope {
            message: "test done".into(),
            details: vec!["job=prime".into()],
            context: Value::Null,
            started_at: None,
            elapsed: Some(Duration::from_millis(1500)),
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["elapsed"], "1s 500ms");
        assert_eq!(json["message"], "test done");

        let back: ResultEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }
}
