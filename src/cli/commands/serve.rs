use crate::cli::Output;
use crate::config::Settings;
use crate::engine::{HookEngine, ShellExecutor};
use crate::hooks::HookSource;
use crate::secrets::read_secrets_from_env;
use crate::server::HookServer;
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct ServeArgs {
    /// Server listen address, overrides `listen_addr`
    #[arg(long, value_name = "ADDR")]
    pub listen_addr: Option<String>,

    /// Directory of hooks, overrides `config_dir`
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, config: Option<&Path>, output: &Output) -> Result<()> {
    let mut settings = Settings::load(config)?;
    if let Some(listen_addr) = args.listen_addr {
        settings.listen_addr = listen_addr;
    }
    if let Some(config_dir) = args.config_dir {
        settings.config_dir = config_dir;
    }
    settings.validate_for_server()?;

    let secrets = read_secrets_from_env(&settings.secret_env_prefix);
    let engine = HookEngine::new(settings.engine_settings())
        .with_executor(Arc::new(ShellExecutor::new(settings.shell.as_str())))
        .with_secrets(secrets);
    let server = HookServer::new(engine, HookSource::new(&settings.config_dir), &settings.token);

    output.info(&format!(
        "Serving hooks from {} on {}",
        settings.config_dir.display(),
        settings.listen_addr
    ));
    output.verbose(&format!(
        "Commands run with {} and time out after {}s",
        settings.shell, settings.command_timeout_secs
    ));
    server.start(&settings.listen_addr).await
}
