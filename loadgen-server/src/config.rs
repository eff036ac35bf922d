//! Configuration for the load generator.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `LG__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `LG__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `LG__LOGGING__LEVEL=debug` raises the log level
//! - `LG__DRIVER__THREADS=16` sets the worker count of the standalone memory driver
//! - `LG__TARGET__ENDPOINT_URL=http://localhost:9000` points storage presets at a local store
//!
//! # YAML Configuration File
//!
//! ```yaml
//! logging:
//!   level: debug
//!   format: json
//!
//! target:
//!   name: bench
//!   endpoint_url: http://localhost:9000
//!   key_id: minio
//!   key: minio123
//!   bucket: set
//!   disable_ssl: true
//!   path_style: true
//! ```

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use loadgen_service::presets::StoreTarget;
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LG__";

/// Newtype around `String` that protects against accidental logging of secrets in the
/// configuration. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Settings of the async runtime jobs run on.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads of the runtime.
    ///
    /// Blocking memory workers run on the separate blocking pool and do not count against this.
    ///
    /// Defaults to the number of CPU cores. Environment variable: `LG__RUNTIME__WORKER_THREADS`.
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Settings of the standalone drivers.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Driver {
    /// Number of workers the `pmemory` driver splits its task across.
    ///
    /// Defaults to `8`. Environment variable: `LG__DRIVER__THREADS`.
    pub threads: usize,
}

impl Default for Driver {
    fn default() -> Self {
        Self { threads: 8 }
    }
}

/// [Sentry](https://sentry.io/) error reporting.
///
/// Disabled unless a DSN is configured.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN. Environment variable: `LG__SENTRY__DSN`.
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name reported with every event, e.g. `"production"`.
    pub environment: Option<Cow<'static, str>>,

    /// Fraction of error events sent to Sentry. Defaults to `1.0`.
    pub sample_rate: f32,

    /// Fraction of transactions sent to Sentry. Defaults to `0.01`.
    pub traces_sample_rate: f32,
}

impl Sentry {
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
        }
    }
}

/// Output format of log lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty output on a terminal, simplified output otherwise.
    Auto,
    /// Multi-line human readable output with colors.
    Pretty,
    /// Compact single-line output without colors.
    Simplified,
    /// One JSON object per line.
    Json,
}

#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Log output settings.
///
/// Logs always go to stderr so that stdout only carries job responses.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum level of emitted log lines. `RUST_LOG` takes precedence when set.
    ///
    /// Defaults to `info`. Environment variable: `LG__LOGGING__LEVEL`.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Format of log lines. Environment variable: `LG__LOGGING__FORMAT`.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: Logging,

    pub sentry: Sentry,

    pub runtime: Runtime,

    pub driver: Driver,

    /// Object store that storage presets and seeding run against.
    ///
    /// Required by `preset io` and `seed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<StoreTarget>,
}

impl Config {
    /// Loads the configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        anyhow::ensure!(
            config.runtime.worker_threads > 0,
            "runtime.worker_threads must be at least 1"
        );

        Ok(config)
    }
}
