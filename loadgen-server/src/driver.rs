//! Standalone drivers that run one workload directly, without a job descriptor.

use std::time::Instant;

use anyhow::Result;
use loadgen_service::presets::StoreTarget;
use loadgen_service::seed::{self, SeedReport};
use loadgen_service::store::{Connector, S3Connector};
use loadgen_service::workload::memory::{self, MemoryTask, ParallelRun};

/// Runs the parallel memory workload split across `threads` workers.
pub async fn pmemory(
    operator_size: usize,
    iterations: u64,
    recursion_depth: u32,
    threads: usize,
) -> Result<ParallelRun> {
    let task = MemoryTask {
        operator_size,
        iterations,
        recursion_depth,
        threads: Some(threads),
    };

    let start = Instant::now();
    let run = memory::run_parallel(&task).await?;
    tracing::info!(
        workers = run.completed,
        operator_size = run.partition.per_worker.operator_size,
        iterations = run.partition.per_worker.iterations,
        elapsed = ?start.elapsed(),
        "parallel memory workload finished"
    );

    Ok(run)
}

/// Writes `count` objects of `size` bytes to the target, named like storage presets expect.
pub async fn seed_target(target: &StoreTarget, count: usize, size: u64) -> Result<SeedReport> {
    let store = S3Connector.connect(&target.store_config())?;
    let keys = target.key_names(count);

    let start = Instant::now();
    let report = seed::seed_objects(store.as_ref(), &target.bucket, &keys, size).await;
    tracing::info!(
        bucket = target.bucket.as_str(),
        written = report.written,
        errors = report.errors,
        elapsed = ?start.elapsed(),
        "seeding finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pmemory_splits_across_threads() {
        loadgen_test::tracing::init();

        let run = pmemory(80, 16, 4, 8).await.unwrap();

        assert_eq!(run.completed, 8);
        assert_eq!(run.partition.per_worker.operator_size, 10);
        assert_eq!(run.partition.per_worker.iterations, 2);
        assert_eq!(run.partition.per_worker.recursion_depth, 4);
    }

    #[tokio::test]
    async fn pmemory_rejects_zero_threads() {
        assert!(pmemory(80, 16, 4, 0).await.is_err());
    }
}
