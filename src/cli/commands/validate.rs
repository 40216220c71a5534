use crate::cli::Output;
use crate::hooks::load_hook_file;
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Hook file to check
    pub file: PathBuf,
}

/// Strict-parse a hook and report handler references that do not resolve
pub async fn execute(args: ValidateArgs, output: &Output) -> Result<()> {
    let hook = load_hook_file(&args.file)?;

    let undefined = hook.undefined_handlers();
    if !undefined.is_empty() {
        for name in &undefined {
            output.error(&format!("Unknown handler {name}"));
        }
        bail!(
            "{} references {} undefined handler(s)",
            args.file.display(),
            undefined.len()
        );
    }

    output.success(&format!(
        "{} is valid ({} tasks, {} handlers)",
        args.file.display(),
        hook.tasks.len(),
        hook.handlers.len()
    ));
    Ok(())
}
