use thiserror::Error;

/// Errors raised while decoding or preparing a workload task.
///
/// None of these abort the job: the dispatcher logs them and reports the job as done with the
/// error attached to the completion details.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task value could not be decoded, usually because a required key is missing.
    #[error("invalid {kind} task: {cause}")]
    Decode {
        kind: &'static str,
        #[source]
        cause: serde_json::Error,
    },

    /// A key needed by the selected workload variant is missing.
    #[error("missing key `{0}` in memory task")]
    MissingKey(&'static str),

    /// The parallel memory workload was asked to run on zero workers.
    #[error("memory task needs at least one worker thread")]
    NoWorkers,

    /// The idle duration is not a non-negative number of seconds.
    #[error("invalid idle duration: {0}")]
    InvalidDuration(String),

    /// A blocking workload worker panicked or was cancelled by the runtime.
    #[error("workload worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for task preparation.
pub type TaskResult<T> = Result<T, TaskError>;
