//! The load generator core: job dispatch and the stress workloads.
//!
//! A job descriptor is a JSON object naming one workload (`prime`, `memory`, `IO` or `idle`)
//! together with its parameters. The [`Dispatcher`] validates the descriptor, reports the start
//! of the job, runs the selected workload and returns the completion envelope produced by its
//! [`Reporter`].
//!
//! Object-store access goes through the [`ObjectStore`](store::ObjectStore) trait, with an S3
//! implementation for real runs and an in-memory one for tests.
#![warn(missing_debug_implementations)]

pub mod dispatcher;
pub mod error;
pub mod presets;
pub mod reporter;
pub mod seed;
pub mod store;
pub mod workload;

pub use dispatcher::{Dispatcher, JobKind, JobResponse, validate};
pub use error::{TaskError, TaskResult};
pub use reporter::{RecordingReporter, Reporter, ResultEnvelope, TracingReporter};
