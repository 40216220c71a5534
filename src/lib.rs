//! # hookd - runbook hooks over HTTP and the command line
//!
//! A hook is a YAML runbook: an ordered list of tasks plus a library of named
//! handlers. Tasks run shell commands, can be guarded by `only_if`, capture
//! output into registers, dispatch handlers with arguments, and recover from
//! failures through `on_failure` handlers. Secrets are interpolated into
//! commands and redacted from every log line.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run a single hook file
//! hookd play -f deploy.yml -s secrets.yml
//!
//! # Serve <config_dir>/<id>/<action>.yml over HTTP
//! HOOKD_TOKEN=changeme hookd serve --config-dir ./hooks
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use hookd::engine::{EngineSettings, HookEngine};
//! use hookd::hooks::load_hook_file;
//! use hookd::secrets::SecretStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> hookd::Result<()> {
//! let engine = HookEngine::new(EngineSettings::default());
//! let hook = Arc::new(load_hook_file("deploy.yml")?);
//! let run = engine.new_run(hook, SecretStore::new());
//! engine.execute(&run).await?;
//! println!("{}", run.log());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod secrets;
pub mod server;

pub use cli::{Cli, Output};
pub use config::Settings;
pub use engine::HookEngine;
pub use error::EngineError;

/// Result type alias for hookd operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
