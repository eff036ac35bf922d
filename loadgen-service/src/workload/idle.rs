//! Wall-clock workload: occupies the job's slot without consuming resources.

use std::time::Duration;

use serde_json::Value;

use crate::error::{TaskError, TaskResult};

/// Decodes the idle duration from the `idle` entry of a job descriptor.
///
/// Accepts non-negative numbers of seconds, fractional ones included, and numeric strings.
pub fn duration(task: &Value) -> TaskResult<Duration> {
    let seconds = match task {
        Value::Number(number) => number.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .ok_or_else(|| TaskError::InvalidDuration(task.to_string()))
}

/// Suspends the calling task for `duration`.
///
/// This yields to the runtime, so other jobs sharing the process keep running.
pub async fn run(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_durations() {
        assert_eq!(duration(&json!(5)).unwrap(), Duration::from_secs(5));
        assert_eq!(duration(&json!(0)).unwrap(), Duration::ZERO);
        assert_eq!(duration(&json!(1.5)).unwrap(), Duration::from_millis(1500));
        assert_eq!(duration(&json!("2")).unwrap(), Duration::from_secs(2));

        assert!(duration(&json!(-1)).is_err());
        assert!(duration(&json!("soon")).is_err());
        assert!(duration(&json!({"seconds": 1})).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_the_full_duration() {
        let start = tokio::time::Instant::now();
        run(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
