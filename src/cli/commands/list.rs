use crate::cli::Output;
use crate::config::Settings;
use crate::hooks::HookSource;
use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ListArgs {
    /// Directory of hooks, overrides `config_dir`
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

pub async fn execute(args: ListArgs, config: Option<&Path>, output: &Output) -> Result<()> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => Settings::load(config)?.config_dir,
    };
    if config_dir.as_os_str().is_empty() {
        bail!("No config directory: pass --config-dir or set HOOKD_CONFIG_DIR");
    }

    let hooks = HookSource::new(&config_dir)
        .list()
        .with_context(|| format!("Failed to list hooks in {}", config_dir.display()))?;

    if hooks.is_empty() {
        output.warning(&format!("No hooks found in {}", config_dir.display()));
        return Ok(());
    }

    output.header(&format!("Hooks in {}", config_dir.display()));
    for hook in &hooks {
        output.list_item(&format!(
            "{}/{} ({} tasks, {} handlers)",
            hook.name, hook.action, hook.tasks, hook.handlers
        ));
    }
    Ok(())
}
