//! Test utilities for the load generator crates.
//!
//! See the modules for all available utilities.

pub mod tracing;
