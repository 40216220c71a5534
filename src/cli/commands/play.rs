use crate::config::Settings;
use crate::engine::{HookEngine, ShellExecutor};
use crate::hooks::load_hook_file;
use crate::secrets::{SecretStore, read_secret_file, read_secrets_from_env};
use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct PlayArgs {
    /// Hook file to run
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// YAML file of secrets; environment secrets are merged over it
    #[arg(short = 's', long = "secrets", value_name = "FILE")]
    pub secrets: Option<PathBuf>,
}

/// Run the hook inline, print the redacted log and exit with the run's code
pub async fn execute(args: PlayArgs, config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config)?;
    settings.validate()?;

    let hook = load_hook_file(&args.file)
        .with_context(|| format!("Failed to load hook {}", args.file.display()))?;

    let mut secrets = SecretStore::new();
    if let Some(path) = &args.secrets {
        let from_file = read_secret_file(path)
            .with_context(|| format!("Failed to read secrets {}", path.display()))?;
        secrets.merge(from_file);
    }
    secrets.merge(read_secrets_from_env(&settings.secret_env_prefix));
    tracing::debug!("Loaded {} secret(s)", secrets.len());

    let engine = HookEngine::new(settings.engine_settings())
        .with_executor(Arc::new(ShellExecutor::new(settings.shell.as_str())));
    let run = engine.new_run(Arc::new(hook), secrets);
    let result = engine.execute(&run).await;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(run.log().as_bytes())?;
    stdout.flush()?;

    let exit_code = match result {
        Err(err) => {
            tracing::warn!("Run {} failed: {}", run.id(), err);
            // A failed run never reports success
            if run.exit_code() == 0 { 1 } else { run.exit_code() }
        }
        Ok(()) => run.exit_code(),
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
