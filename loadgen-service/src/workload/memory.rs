//! Memory workload: randomized arithmetic over two large `f64` buffers.
//!
//! Every iteration walks down a recursive call chain of `recursion_depth` frames and mutates a
//! single element at the bottom. The recursion is there to put pressure on the call stack, the
//! buffers to churn memory and caches. Every [`SWAP_INTERVAL`] iterations the two buffers swap
//! roles.

use std::hint::black_box;
use std::mem;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TaskError, TaskResult};

/// The buffers swap roles whenever the iteration index is a multiple of this.
pub const SWAP_INTERVAL: u64 = 100;

/// Parameters of a memory stress task.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct MemoryTask {
    /// Number of elements in each buffer.
    pub operator_size: usize,
    /// Number of mutations to perform.
    #[serde(rename = "itterations")]
    pub iterations: u64,
    /// Depth of the recursive call chain per mutation.
    pub recursion_depth: u32,
    /// Number of parallel workers. Selects the parallel variant when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl MemoryTask {
    /// Decodes a task from the `memory` entry of a job descriptor.
    pub fn from_value(value: &Value) -> TaskResult<Self> {
        Self::deserialize(value).map_err(|cause| TaskError::Decode {
            kind: "memory",
            cause,
        })
    }

    /// Splits this task evenly across its worker threads.
    ///
    /// Buffer size and iteration count are divided with integer division, so any remainder is
    /// not performed by any worker. The recursion depth stays the same for every worker.
    pub fn partition(&self) -> TaskResult<Partition> {
        let workers = self.threads.ok_or(TaskError::MissingKey("threads"))?;
        if workers == 0 {
            return Err(TaskError::NoWorkers);
        }

        let per_worker = MemoryTask {
            operator_size: self.operator_size / workers,
            iterations: self.iterations / workers as u64,
            recursion_depth: self.recursion_depth,
            threads: None,
        };

        Ok(Partition {
            workers,
            per_worker,
        })
    }
}

/// How a parallel memory task is distributed over its workers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Partition {
    /// Number of independent workers.
    pub workers: usize,
    /// The task every worker runs.
    pub per_worker: MemoryTask,
}

/// Generates a buffer of `n` random values in `[0.1, 99000)`.
pub fn generate_array(n: usize) -> Vec<f64> {
    fill_array(&mut rand::rng(), n)
}

fn fill_array<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<f64> {
    (0..n)
        .map(|_| rng.random_range(0.1..9.9) * rng.random_range(1..=10_000) as f64)
        .collect()
}

/// Combines one random element of each buffer and writes the result to a random slot.
///
/// Multiplies or divides with equal probability, falling back to multiplication when the divisor
/// is not positive. The result lands in `left` or `right` with equal probability.
pub fn mutate_step<R: Rng + ?Sized>(rng: &mut R, left: &mut [f64], right: &mut [f64]) {
    if left.is_empty() || right.is_empty() {
        return;
    }

    let a = left[rng.random_range(0..left.len())];
    let b = right[rng.random_range(0..right.len())];

    let c = if rng.random_bool(0.5) || b <= 0.0 {
        a * b
    } else {
        a / b
    };

    if rng.random_bool(0.5) {
        left[rng.random_range(0..left.len())] = c;
    } else {
        right[rng.random_range(0..right.len())] = c;
    }
}

/// Recurses `max_depth - depth` times, then performs a single [`mutate_step`].
pub fn recurse<R: Rng + ?Sized>(
    rng: &mut R,
    depth: u32,
    max_depth: u32,
    left: &mut [f64],
    right: &mut [f64],
) {
    if depth < max_depth {
        recurse(rng, depth + 1, max_depth, left, right);
        // keeps the frame alive so the chain cannot be turned into a loop
        black_box(depth);
    } else {
        mutate_step(rng, left, right);
    }
}

/// Runs a memory task on the calling thread and returns the final `(left, right)` buffers.
pub fn run(task: &MemoryTask) -> (Vec<f64>, Vec<f64>) {
    let mut rng = SmallRng::from_rng(&mut rand::rng());

    let left = fill_array(&mut rng, task.operator_size);
    let right = fill_array(&mut rng, task.operator_size);

    run_with(
        &mut rng,
        left,
        right,
        task.iterations,
        task.recursion_depth,
    )
}

/// Mutates the given buffers for `iterations` steps and returns them in their final roles.
///
/// The buffers swap roles after every step whose index is a multiple of [`SWAP_INTERVAL`],
/// starting with the first one.
fn run_with<R: Rng + ?Sized>(
    rng: &mut R,
    mut left: Vec<f64>,
    mut right: Vec<f64>,
    iterations: u64,
    recursion_depth: u32,
) -> (Vec<f64>, Vec<f64>) {
    for i in 0..iterations {
        recurse(rng, 0, recursion_depth, &mut left, &mut right);

        if i % SWAP_INTERVAL == 0 {
            mem::swap(&mut left, &mut right);
        }
    }

    (left, right)
}

/// Runs a single-worker memory task on the blocking thread pool.
pub async fn run_blocking(task: MemoryTask) -> TaskResult<(Vec<f64>, Vec<f64>)> {
    Ok(tokio::task::spawn_blocking(move || run(&task)).await?)
}

/// Result of a parallel memory run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParallelRun {
    /// How the task was split.
    pub partition: Partition,
    /// Number of workers that ran to completion.
    pub completed: usize,
}

/// Runs a memory task split across `threads` independent workers and waits for all of them.
///
/// The workers share nothing and their buffers are dropped when they finish.
pub async fn run_parallel(task: &MemoryTask) -> TaskResult<ParallelRun> {
    let partition = task.partition()?;

    tracing::debug!(
        workers = partition.workers,
        per_worker = ?partition.per_worker,
        "starting memory workers"
    );

    let handles: Vec<_> = (0..partition.workers)
        .map(|worker| {
            let task = partition.per_worker.clone();
            tokio::task::spawn_blocking(move || {
                run(&task);
                tracing::trace!(worker, "memory worker finished");
            })
        })
        .collect();

    let mut completed = 0;
    for result in futures_util::future::join_all(handles).await {
        result?;
        completed += 1;
    }

    Ok(ParallelRun {
        partition,
        completed,
    })
}
