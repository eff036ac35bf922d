//! The `loadgen` command line.
//!
//! Runs single jobs the way the serverless handler would, plus standalone drivers and helpers for
//! preparing a load test. See [`loadgen_server::cli`] for the available subcommands.
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    loadgen_server::cli::execute()
}
