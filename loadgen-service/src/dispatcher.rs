//! Routing of job descriptors to workloads.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::reporter::{Reporter, ResultEnvelope};
use crate::store::Connector;
use crate::workload::{WorkloadOutcome, idle, io, memory, prime};

/// Message reported for every completed job.
pub const DONE_MESSAGE: &str = "test done";

/// Error returned for descriptors that do not name a workload.
pub const INVALID_JOB: &str = "job not defined correctly";

/// The workload kinds, in dispatch priority order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobKind {
    Prime,
    Memory,
    Io,
    Idle,
}

impl JobKind {
    /// All kinds, highest priority first.
    pub const PRIORITY: [JobKind; 4] = [JobKind::Prime, JobKind::Memory, JobKind::Io, JobKind::Idle];

    /// The descriptor key selecting this kind.
    pub fn key(self) -> &'static str {
        match self {
            JobKind::Prime => "prime",
            JobKind::Memory => "memory",
            JobKind::Io => "IO",
            JobKind::Idle => "idle",
        }
    }

    /// Selects the workload of a descriptor along with its task value.
    ///
    /// If several recognized keys are present, the first one in [`JobKind::PRIORITY`] wins.
    pub fn select(job: &Value) -> Option<(JobKind, &Value)> {
        let job = job.as_object()?;
        Self::PRIORITY
            .into_iter()
            .find_map(|kind| job.get(kind.key()).map(|task| (kind, task)))
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Prime => "prime",
            JobKind::Memory => "memory",
            JobKind::Io => "io",
            JobKind::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Returns `true` if `job` is an object naming at least one workload.
pub fn validate(job: &Value) -> bool {
    JobKind::select(job).is_some()
}

/// Response to a dispatched job.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobResponse {
    /// The job ran; this is the reporter's completion envelope.
    Done(ResultEnvelope),
    /// The descriptor was rejected before anything ran.
    Invalid { error: String },
}

impl JobResponse {
    fn invalid() -> Self {
        JobResponse::Invalid {
            error: INVALID_JOB.to_owned(),
        }
    }

    /// Returns the completion envelope, if the job ran.
    pub fn envelope(&self) -> Option<&ResultEnvelope> {
        match self {
            JobResponse::Done(envelope) => Some(envelope),
            JobResponse::Invalid { .. } => None,
        }
    }
}

/// Validates job descriptors, runs the selected workload and reports around it.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    reporter: Arc<dyn Reporter>,
    connector: Arc<dyn Connector>,
}

impl Dispatcher {
    /// Creates a dispatcher reporting to `reporter` and building store clients with `connector`.
    pub fn new(reporter: Arc<dyn Reporter>, connector: Arc<dyn Connector>) -> Self {
        Self {
            reporter,
            connector,
        }
    }

    /// Runs one job to completion.
    ///
    /// Invalid descriptors are answered with an error response without reporting anything.
    pub async fn dispatch(&self, job: &Value, context: &Value) -> JobResponse {
        let Some((kind, task)) = JobKind::select(job) else {
            let keys: Vec<&str> = job
                .as_object()
                .map(|job| job.keys().map(String::as_str).collect())
                .unwrap_or_default();
            tracing::warn!(?keys, "rejecting job without a recognized workload");
            return JobResponse::invalid();
        };

        self.reporter.report_start(context, job);

        let outcome = self.execute(kind, task).await;
        if let WorkloadOutcome::Rejected(error) = &outcome {
            tracing::error!(
                error = error as &dyn std::error::Error,
                %kind,
                "workload did not run"
            );
        }

        let mut details = vec![format!("job={kind}")];
        details.extend(outcome.details());

        JobResponse::Done(self.reporter.report_done(context, DONE_MESSAGE, details))
    }

    /// Runs the workload of the given kind on its task value.
    #[tracing::instrument(level = "debug", skip(self, task))]
    pub async fn execute(&self, kind: JobKind, task: &Value) -> WorkloadOutcome {
        match kind {
            JobKind::Prime => WorkloadOutcome::Prime(prime::check(task)),
            JobKind::Memory => run_memory(task).await,
            JobKind::Io => WorkloadOutcome::Io(io::run(Some(task), self.connector.as_ref()).await),
            JobKind::Idle => match idle::duration(task) {
                Ok(duration) => {
                    idle::run(duration).await;
                    WorkloadOutcome::Idle(duration)
                }
                Err(error) => WorkloadOutcome::Rejected(error),
            },
        }
    }
}

async fn run_memory(task: &Value) -> WorkloadOutcome {
    let task = match memory::MemoryTask::from_value(task) {
        Ok(task) => task,
        Err(error) => return WorkloadOutcome::Rejected(error),
    };

    let result = if task.threads.is_some() {
        memory::run_parallel(&task)
            .await
            .map(WorkloadOutcome::ParallelMemory)
    } else {
        memory::run_blocking(task)
            .await
            .map(|(left, right)| WorkloadOutcome::Memory(left, right))
    };

    result.unwrap_or_else(WorkloadOutcome::Rejected)
}

#[cfg(test)]
mod tests {
    use loadgen_test::tracing::LogCapture;
    use serde_json::json;

    use super::*;
    use crate::reporter::RecordingReporter;
    use crate::store::InMemoryConnector;

    #[test]
    fn validate_requires_a_known_key() {
        assert!(validate(&json!({"prime": 7})));
        assert!(validate(&json!({"IO": {}})));
        assert!(validate(&json!({"idle": 1, "other": true})));

        assert!(!validate(&json!({})));
        assert!(!validate(&json!({"io": {}})));
        assert!(!validate(&json!({"Prime": 7})));
        assert!(!validate(&json!(["prime"])));
        assert!(!validate(&json!("prime")));
        assert!(!validate(&Value::Null));
    }

    #[test]
    fn selection_follows_priority() {
        let job = json!({"idle": 5, "IO": {}, "memory": {}, "prime": 7});
        assert_eq!(JobKind::select(&job).unwrap().0, JobKind::Prime);

        let job = json!({"idle": 5, "IO": {}, "memory": {}});
        assert_eq!(JobKind::select(&job).unwrap().0, JobKind::Memory);

        let job = json!({"idle": 5, "IO": {}});
        assert_eq!(JobKind::select(&job).unwrap().0, JobKind::Io);

        let job = json!({"idle": 5});
        let (kind, task) = JobKind::select(&job).unwrap();
        assert_eq!(kind, JobKind::Idle);
        assert_eq!(task, &json!(5));
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(RecordingReporter::new()),
            Arc::new(InMemoryConnector::default()),
        )
    }

    #[tokio::test]
    async fn rejected_jobs_are_not_logged_verbatim() {
        let capture = LogCapture::start();

        let job = json!({"io": {"key": "minio123"}});
        dispatcher().dispatch(&job, &Value::Null).await;

        let output = capture.output();
        assert!(output.contains("rejecting job"), "{output}");
        assert!(!output.contains("minio123"), "{output}");
    }

    #[tokio::test]
    async fn rejected_memory_task_logs_one_error() {
        let capture = LogCapture::start();

        let job = json!({"memory": {
            "threads": 0,
            "operator_size": 10,
            "itterations": 10,
            "recursion_depth": 1,
        }});
        let response = dispatcher().dispatch(&job, &Value::Null).await;

        assert_eq!(
            response.envelope().unwrap().details[1],
            "error=memory task needs at least one worker thread"
        );
        assert_eq!(capture.errors(), 1, "{}", capture.output());
    }

    #[test]
    fn invalid_response_shape() {
        let response = serde_json::to_value(JobResponse::invalid()).unwrap();
        assert_eq!(response, json!({"error": "job not defined correctly"}));
    }
}
