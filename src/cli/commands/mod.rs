use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

pub mod list;
pub mod play;
pub mod serve;
pub mod validate;
pub mod version;

use crate::cli::Output;

#[derive(Parser)]
#[command(
    name = "hookd",
    version = crate::VERSION,
    about = "Run runbook hooks from the command line or over HTTP",
    long_about = "hookd runs YAML hooks: ordered shell steps with guards, registers, \
                  reusable handlers and failure recovery, with secrets redacted from every log."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single hook file and print its log
    Play(play::PlayArgs),
    /// Serve hooks from a config directory over HTTP
    Serve(serve::ServeArgs),
    /// List hooks found in a config directory
    List(list::ListArgs),
    /// Check a hook file without running it
    Validate(validate::ValidateArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);
        let config = self.config.as_deref();

        match self.command {
            Some(Commands::Play(args)) => play::execute(args, config).await,
            Some(Commands::Serve(args)) => serve::execute(args, config, &output).await,
            Some(Commands::List(args)) => list::execute(args, config, &output).await,
            Some(Commands::Validate(args)) => validate::execute(args, &output).await,
            Some(Commands::Version(args)) => version::execute(args).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Logs go to stderr so `play` output stays clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
