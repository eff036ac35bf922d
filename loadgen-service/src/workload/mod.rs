//! The stress routines a job can select.
//!
//! Each submodule stresses one resource dimension: [`prime`] the CPU, [`memory`] memory and the
//! call stack, [`io`] an object store, and [`idle`] only wall-clock time.

use std::time::Duration;

use crate::error::TaskError;

pub mod idle;
pub mod io;
pub mod memory;
pub mod prime;

pub use io::{IoStats, IoTask};
pub use memory::{MemoryTask, ParallelRun, Partition};

/// What a workload produced.
#[derive(Debug)]
pub enum WorkloadOutcome {
    /// Result of the primality test.
    Prime(bool),
    /// Final buffers of a single-worker memory run.
    Memory(Vec<f64>, Vec<f64>),
    /// A parallel memory run; per-worker buffers are discarded.
    ParallelMemory(ParallelRun),
    /// Totals of a storage run.
    Io(IoStats),
    /// Time spent idling.
    Idle(Duration),
    /// The task could not be run.
    Rejected(TaskError),
}

impl WorkloadOutcome {
    /// A `key=value` summary for completion reports.
    pub fn details(&self) -> Vec<String> {
        match self {
            WorkloadOutcome::Prime(prime) => vec![format!("probable_prime={prime}")],
            WorkloadOutcome::Memory(left, _) => vec![format!("operator_size={}", left.len())],
            WorkloadOutcome::ParallelMemory(run) => vec![
                format!("workers={}", run.completed),
                format!("operator_size={}", run.partition.per_worker.operator_size),
            ],
            WorkloadOutcome::Io(stats) => vec![
                format!("read={}", stats.reads),
                format!("written={}", stats.writes),
                format!("errors={}", stats.errors),
            ],
            WorkloadOutcome::Idle(duration) => {
                vec![format!("seconds={}", duration.as_secs_f64())]
            }
            WorkloadOutcome::Rejected(error) => vec![format!("error={error}")],
        }
    }
}
