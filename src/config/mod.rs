//! Configuration for the hookd server and CLI
//!
//! Settings are layered with `figment` (see [`HookdConfig`]) and extracted into
//! a typed [`Settings`].

mod core;

pub use self::core::HookdConfig;

use crate::engine::EngineSettings;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub listen_addr: String,

    /// Directory holding `<id>/<action>.yml` hook files
    pub config_dir: PathBuf,

    /// Expected `Auth-Token` header value
    pub token: String,

    /// Shell running each command as `<shell> -c <command>`
    pub shell: String,

    /// Ceiling for commands whose task does not set `timeout`
    pub command_timeout_secs: u64,

    /// Environment variables with this prefix are read as secrets
    pub secret_env_prefix: String,
}

impl Settings {
    pub fn load(custom_config: Option<&std::path::Path>) -> Result<Self> {
        HookdConfig::load_with_custom_config(custom_config)?.settings()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            command_timeout: self.command_timeout(),
        }
    }

    /// Checks shared by every command
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            bail!("command_timeout_secs must be greater than zero");
        }
        if self.shell.trim().is_empty() {
            bail!("shell must not be empty");
        }
        Ok(())
    }

    /// Checks required before serving hooks over HTTP
    pub fn validate_for_server(&self) -> Result<()> {
        self.validate()?;
        if self.token.trim().is_empty() {
            bail!("Empty token: set HOOKD_TOKEN or `token` in the config file. Failing to start.");
        }
        if self.config_dir.as_os_str().is_empty() {
            bail!("Empty config_dir: set HOOKD_CONFIG_DIR or pass --config-dir. Failing to start.");
        }
        if !self.config_dir.is_dir() {
            bail!("Config directory does not exist: {}", self.config_dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
