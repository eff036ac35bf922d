//! Ready-made job descriptors for seven complexity levels per workload kind.
//!
//! Level `0` is the lightest, level `6` the heaviest. Storage jobs additionally need a
//! [`StoreTarget`] naming the store they run against.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::store::{DEFAULT_REGION, Secret, StoreConfig};
use crate::workload::io::Flag;
use crate::workload::{IoTask, MemoryTask};

/// Highest supported complexity level.
pub const MAX_LEVEL: u8 = 6;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// `(operator_size, itterations, recursion_depth)` per level.
const MEMORY_LEVELS: [(usize, u64, u32); 7] = [
    (100, 10_000, 20),
    (1_000, 10_000, 20),
    (100, 100_000, 20),
    (1_000, 1_000_000, 20),
    (100, 100_000, 2_000),
    (10_000, 100_000, 2_000),
    (10_000, 1_000_000, 2_000),
];

/// Idle seconds per level.
const IDLE_LEVELS: [u64; 7] = [0, 2, 8, 16, 32, 64, 128];

/// Upper bound of the prime candidate distribution per level.
const PRIME_LEVELS: [u64; 7] = [
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

const IO_LEVELS: [IoProfile; 7] = [
    IoProfile::new(1_000, 0.0, 512, 10, 5 * MIB),
    IoProfile::new(1_000, 1.0, 512, 0, 5 * MIB),
    IoProfile::new(10_000, 0.5, MIB, 20, 100 * MIB),
    IoProfile::new(10_000, 0.5, 2 * MIB, 20, 100 * MIB),
    IoProfile::new(100_000, 0.7, 20 * MIB, 10, 100 * MIB),
    IoProfile::new(10_000, 0.7, 50 * MIB, 10, 100 * MIB),
    IoProfile::new(100, 0.7, 100 * MIB, 10, 100 * MIB),
];

/// Errors building a preset job.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("unknown workload kind `{0}`, expected one of idle, memory, prime, io")]
    UnknownKind(String),
    #[error("complexity level {0} out of range 0..={MAX_LEVEL}")]
    UnknownLevel(u8),
    #[error("io presets need a store target")]
    MissingTarget,
}

/// Workload kinds with presets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PresetKind {
    Idle,
    Memory,
    Prime,
    Io,
}

impl FromStr for PresetKind {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            s if s.eq_ignore_ascii_case("idle") => PresetKind::Idle,
            s if s.eq_ignore_ascii_case("memory") => PresetKind::Memory,
            s if s.eq_ignore_ascii_case("prime") => PresetKind::Prime,
            s if s.eq_ignore_ascii_case("io") => PresetKind::Io,
            s => return Err(PresetError::UnknownKind(s.to_owned())),
        };
        Ok(kind)
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PresetKind::Idle => "idle",
            PresetKind::Memory => "memory",
            PresetKind::Prime => "prime",
            PresetKind::Io => "io",
        };
        f.write_str(name)
    }
}

/// Shape of a storage preset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IoProfile {
    /// Number of operations.
    pub iterations: u64,
    /// Probability of a read.
    pub read_write: f64,
    /// Bytes per operation.
    pub chunk_size: u64,
    /// Number of objects to seed for reads.
    pub object_count: usize,
    /// Size of every seeded object.
    pub object_size: u64,
}

impl IoProfile {
    const fn new(
        iterations: u64,
        read_write: f64,
        chunk_size: u64,
        object_count: usize,
        object_size: u64,
    ) -> Self {
        Self {
            iterations,
            read_write,
            chunk_size,
            object_count,
            object_size,
        }
    }
}

/// The object store a storage preset runs against.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StoreTarget {
    /// Prefix for seeded key names.
    pub name: String,
    pub endpoint_url: String,
    pub key_id: String,
    pub key: Secret,
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub disable_ssl: bool,
    #[serde(default)]
    pub path_style: bool,
}

impl StoreTarget {
    /// Names of the seeded objects reads pick from.
    pub fn key_names(&self, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("in_{}_{i}.bin", self.name))
            .collect()
    }

    /// Connection settings for this target.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoint: self.endpoint_url.clone(),
            access_key_id: self.key_id.clone(),
            secret_key: self.key.clone(),
            region: self
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            tls: !self.disable_ssl,
            path_style: self.path_style,
        }
    }
}

/// Memory task for the given level.
pub fn memory(level: u8) -> Option<MemoryTask> {
    let (operator_size, iterations, recursion_depth) = *MEMORY_LEVELS.get(level as usize)?;
    Some(MemoryTask {
        operator_size,
        iterations,
        recursion_depth,
        threads: None,
    })
}

/// Idle seconds for the given level.
pub fn idle(level: u8) -> Option<u64> {
    IDLE_LEVELS.get(level as usize).copied()
}

/// Draws a prime candidate for the given level.
///
/// The candidate is the sum of two uniform draws below the level's bound, minus one, so larger
/// levels produce larger and harder candidates.
pub fn prime<R: Rng + ?Sized>(rng: &mut R, level: u8) -> Option<u64> {
    let bound = *PRIME_LEVELS.get(level as usize)?;
    let candidate = rng.random_range(0..bound) + rng.random_range(0..bound);
    Some(candidate.saturating_sub(1))
}

/// Storage profile for the given level.
pub fn io(level: u8) -> Option<IoProfile> {
    IO_LEVELS.get(level as usize).copied()
}

/// Builds the storage task for a level against a target.
pub fn io_task(level: u8, target: &StoreTarget) -> Option<IoTask> {
    let profile = io(level)?;
    Some(IoTask {
        endpoint_url: target.endpoint_url.clone(),
        key_id: target.key_id.clone(),
        key: target.key.clone(),
        keys: target.key_names(profile.object_count),
        iterations: profile.iterations,
        bucket: target.bucket.clone(),
        read_write: profile.read_write,
        chunk_size: profile.chunk_size,
        region: target.region.clone(),
        disable_ssl: Some(Flag::from(target.disable_ssl)),
        path_style: Some(Flag::from(target.path_style)),
    })
}

/// Builds a complete job descriptor for a workload kind and level.
pub fn job(kind: PresetKind, level: u8, target: Option<&StoreTarget>) -> Result<Value, PresetError> {
    let unknown = || PresetError::UnknownLevel(level);

    let job = match kind {
        PresetKind::Idle => json!({ "idle": idle(level).ok_or_else(unknown)? }),
        PresetKind::Memory => json!({ "memory": memory(level).ok_or_else(unknown)? }),
        PresetKind::Prime => json!({ "prime": prime(&mut rand::rng(), level).ok_or_else(unknown)? }),
        PresetKind::Io => {
            let target = target.ok_or(PresetError::MissingTarget)?;
            json!({ "IO": io_task(level, target).ok_or_else(unknown)? })
        }
    };

    Ok(job)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::dispatcher::{JobKind, validate};

    fn target() -> StoreTarget {
        StoreTarget {
            name: "bench".into(),
            endpoint_url: "localhost:9000".into(),
            key_id: "minio".into(),
            key: Secret::from("minio123"),
            bucket: "set".into(),
            region: None,
            disable_ssl: true,
            path_style: true,
        }
    }

    #[test]
    fn every_level_builds_a_valid_job() {
        let target = target();
        for kind in [
            PresetKind::Idle,
            PresetKind::Memory,
            PresetKind::Prime,
            PresetKind::Io,
        ] {
            for level in 0..=MAX_LEVEL {
                let job = job(kind, level, Some(&target)).unwrap();
                assert!(validate(&job), "{kind} level {level}: {job}");
            }
            assert!(matches!(
                job(kind, MAX_LEVEL + 1, Some(&target)),
                Err(PresetError::UnknownLevel(7))
            ));
        }
    }

    #[test]
    fn memory_job_round_trips() {
        let job = job(PresetKind::Memory, 4, None).unwrap();
        let (kind, task) = JobKind::select(&job).unwrap();
        assert_eq!(kind, JobKind::Memory);
        assert_eq!(
            MemoryTask::from_value(task).unwrap(),
            MemoryTask {
                operator_size: 100,
                iterations: 100_000,
                recursion_depth: 2_000,
                threads: None,
            }
        );
    }

    #[test]
    fn io_job_is_complete() {
        let job = job(PresetKind::Io, 2, Some(&target())).unwrap();
        let task = IoTask::from_value(&job["IO"]).unwrap();
        assert_eq!(task.keys.len(), 20);
        assert_eq!(task.keys[3], "in_bench_3.bin");
        assert_eq!(task.chunk_size, MIB);
        assert!(!task.store_config().tls);
        assert!(task.store_config().path_style);
    }

    #[test]
    fn target_store_config() {
        let mut target = target();
        let config = target.store_config();
        assert_eq!(config.region, DEFAULT_REGION);
        assert!(!config.tls);
        assert!(config.path_style);

        target.region = Some("eu-west-1".into());
        target.disable_ssl = false;
        let config = target.store_config();
        assert_eq!(config.region, "eu-west-1");
        assert!(config.tls);
        assert_eq!(config.secret_key.expose(), "minio123");
    }

    #[test]
    fn io_needs_target() {
        assert!(matches!(
            job(PresetKind::Io, 0, None),
            Err(PresetError::MissingTarget)
        ));
    }

    #[test]
    fn prime_candidates_stay_below_twice_the_bound() {
        let mut rng = SmallRng::seed_from_u64(5);
        for level in 0..=MAX_LEVEL {
            let bound = PRIME_LEVELS[level as usize];
            for _ in 0..100 {
                assert!(prime(&mut rng, level).unwrap() < 2 * bound);
            }
        }
        assert_eq!(prime(&mut rng, 7), None);
    }

    #[test]
    fn parses_kinds() {
        assert_eq!("IO".parse::<PresetKind>().unwrap(), PresetKind::Io);
        assert_eq!("memory".parse::<PresetKind>().unwrap(), PresetKind::Memory);
        assert!("cpu".parse::<PresetKind>().is_err());
    }
}
