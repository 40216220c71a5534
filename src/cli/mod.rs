//! Command-line interface for hookd
//!
//! Argument parsing lives in [`commands`]; every subcommand has its own module
//! with an `Args` struct and an `execute` function.

pub mod commands;
mod output;

pub use commands::Cli;
pub use output::Output;
