use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use loadgen_service::presets::{self, PresetError, PresetKind};
use serde_json::Value;

use crate::config::Config;
use crate::handler::{self, Handler};
use crate::{driver, observability};

/// Synthetic load generator for serverless platforms.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Pmemory(PmemoryCommand),
    Preset(PresetCommand),
    Seed(SeedCommand),
    Version(VersionCommand),
}

/// run a single job and print the handler response
///
/// The job descriptor is read from the given file, or from stdin if no file or `-` is given.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// path to the job descriptor
    #[argh(positional)]
    job: Option<PathBuf>,

    /// JSON value passed through to the completion report
    #[argh(option)]
    context: Option<String>,
}

/// run the parallel memory workload directly
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "pmemory")]
struct PmemoryCommand {
    /// elements per buffer, split across workers
    #[argh(positional)]
    operator_size: usize,

    /// mutation steps, split across workers
    #[argh(positional)]
    itterations: u64,

    /// call depth of every mutation step
    #[argh(positional)]
    recursion_depth: u32,

    /// number of workers, overrides `driver.threads`
    #[argh(option)]
    threads: Option<usize>,
}

/// print the job descriptor of a workload kind at a complexity level (0-6)
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "preset")]
struct PresetCommand {
    /// one of idle, memory, prime, io
    #[argh(positional)]
    kind: PresetKind,

    /// complexity level
    #[argh(positional)]
    level: u8,
}

/// write the objects that io presets read from to the configured target
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "seed")]
struct SeedCommand {
    /// io complexity level whose object count and size to use
    #[argh(option, default = "0")]
    level: u8,

    /// number of objects, overrides the level
    #[argh(option)]
    count: Option<usize>,

    /// size of every object in bytes, overrides the level
    #[argh(option)]
    size: Option<u64>,
}

/// print the loadgen version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("loadgen-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(command) => run(command).await,
            Command::Pmemory(command) => pmemory(command, &config).await,
            Command::Preset(command) => preset(command, &config),
            Command::Seed(command) => seed(command, &config).await,
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}

async fn run(command: RunCommand) -> Result<()> {
    let job = match command.job {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            handler::read_job(file)?
        }
        _ => handler::read_job(io::stdin().lock())?,
    };

    let context = match command.context {
        Some(context) => serde_json::from_str(&context).context("context is not valid JSON")?,
        None => Value::Null,
    };

    let response = Handler::new().handle(&job, &context).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn pmemory(command: PmemoryCommand, config: &Config) -> Result<()> {
    let threads = command.threads.unwrap_or(config.driver.threads);
    driver::pmemory(
        command.operator_size,
        command.itterations,
        command.recursion_depth,
        threads,
    )
    .await?;
    Ok(())
}

fn preset(command: PresetCommand, config: &Config) -> Result<()> {
    let job = presets::job(command.kind, command.level, config.target.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

async fn seed(command: SeedCommand, config: &Config) -> Result<()> {
    let target = config.target.as_ref().ok_or(PresetError::MissingTarget)?;
    let profile = presets::io(command.level).ok_or(PresetError::UnknownLevel(command.level))?;

    let count = command.count.unwrap_or(profile.object_count);
    let size = command.size.unwrap_or(profile.object_size);

    let report = driver::seed_target(target, count, size).await?;
    anyhow::ensure!(
        report.errors == 0,
        "failed to seed {} of {count} objects",
        report.errors
    );
    Ok(())
}
