//! Command line interface module
//!
//! Argument parsing and the runner that executes one transfer and reports it.

pub mod args;
pub mod runner;

pub use args::{Args, OutputFormat};
pub use runner::Runner;
