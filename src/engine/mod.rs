//! Hook execution engine
//!
//! A [`HookEngine`] turns a [`Hook`] into a [`Run`]: it walks the hook's tasks,
//! runs their commands through a [`CommandExecutor`], records exit codes and
//! registers, and writes a redacted log. Runs can be driven inline with
//! [`HookEngine::execute`] or detached with [`HookEngine::spawn`], after which
//! they are looked up through the engine's [`RunRegistry`].

pub mod executor;
pub mod interpolate;
mod interpreter;
pub mod redact;
pub mod registry;
pub mod run;

pub use executor::{
    CommandExecutor, CommandFailure, CommandOutput, CommandRequest, ShellExecutor,
    UNKNOWN_EXIT_CODE,
};
pub use registry::RunRegistry;
pub use run::{Run, RunSnapshot};

use crate::error::{EngineError, Result};
use crate::hooks::{Hook, Vars};
use crate::secrets::SecretStore;
use interpreter::Interpreter;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling on a single command when the task does not set `timeout`
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub command_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct HookEngine {
    settings: Arc<EngineSettings>,
    executor: Arc<dyn CommandExecutor>,
    registry: Arc<RunRegistry>,
    secrets: SecretStore,
}

impl HookEngine {
    /// Engine running commands through `/bin/sh` with its own registry
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_parts(
            settings,
            Arc::new(ShellExecutor::default()),
            Arc::new(RunRegistry::new()),
            SecretStore::new(),
        )
    }

    pub fn with_parts(
        settings: EngineSettings,
        executor: Arc<dyn CommandExecutor>,
        registry: Arc<RunRegistry>,
        secrets: SecretStore,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            executor,
            registry,
            secrets,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Secrets used by [`HookEngine::spawn`]
    pub fn with_secrets(mut self, secrets: SecretStore) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Allocate a run without starting or registering it
    pub fn new_run(&self, hook: Arc<Hook>, secrets: SecretStore) -> Arc<Run> {
        Arc::new(Run::new(hook, secrets))
    }

    /// Drive `run` to completion on the current task
    ///
    /// Returns the failure that stopped the run, if any. The run is marked
    /// completed either way, and its summary line is the last one logged.
    pub async fn execute(&self, run: &Run) -> Result<()> {
        let hook = run.hook().clone();
        tracing::info!(run = run.id(), hook = %hook.locator(), "Starting job");
        run.log_info(&format!("Starting job {}", run.id()));

        let root = Vars::new();
        let mut interpreter =
            Interpreter::new(run, &hook, self.executor.as_ref(), &self.settings);
        let result = interpreter.run_sequence(&hook.tasks, &root).await;

        if let Err(err) = &result {
            tracing::warn!(run = run.id(), "Job stopped: {}", err);
        }
        let exit_code = run.exit_code();
        tracing::info!(run = run.id(), exit_code, "Job completed");
        run.log_info(&format!(
            "Job {} completed with exit code {exit_code}",
            run.id()
        ));
        run.complete();
        result
    }

    /// Start a detached run of `hook` with the engine's secrets
    pub fn spawn(&self, hook: Arc<Hook>) -> Arc<Run> {
        self.spawn_with_secrets(hook, self.secrets.clone())
    }

    /// Register a new run and drive it on a background task
    ///
    /// Returns as soon as the run is registered; poll it through
    /// [`HookEngine::get_run`] or await [`Run::wait`].
    pub fn spawn_with_secrets(&self, hook: Arc<Hook>, secrets: SecretStore) -> Arc<Run> {
        let run = self.new_run(hook, secrets);
        self.registry.insert(run.clone());

        let engine = self.clone();
        let driven = run.clone();
        tokio::spawn(async move {
            // The outcome is recorded in the run itself
            let _ = engine.execute(&driven).await;
        });
        run
    }

    /// Look up a run started for `hook`
    ///
    /// Runs of other hooks are reported as not found.
    pub fn get_run(&self, hook: &Hook, id: &str) -> Result<Arc<Run>> {
        self.registry
            .get(id)
            .filter(|run| run.hook().locator() == hook.locator())
            .ok_or_else(|| EngineError::RunNotFound(id.to_string()))
    }

    /// Registered runs of `hook`, oldest first
    pub fn runs(&self, hook: &Hook) -> Vec<Arc<Run>> {
        self.registry.list(&hook.locator())
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
