//! Command line interface module
//!
//! Argument parsing and the runner that wires the policy, resolver and pull
//! driver together for the `docker-registry-resolver` binary.

pub mod args;
pub mod runner;

pub use args::{Args, Command, OutputFormat};
pub use runner::Runner;
