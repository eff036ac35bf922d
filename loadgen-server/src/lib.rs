//! The load generator binary.
//!
//! This builds on top of [`loadgen_service`] and adds everything needed to run jobs from the
//! command line: configuration, logging and error reporting, the handler response wrapper, and the
//! standalone drivers.

pub mod cli;
pub mod config;
pub mod driver;
pub mod handler;
pub mod observability;
