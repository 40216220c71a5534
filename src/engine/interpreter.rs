//! Task interpreter
//!
//! Walks a task sequence in declared order. For each task:
//!
//! 1. run the `only_if` guard; a failing guard skips the task without failing it
//! 2. dispatch `handler`, or else run `command` (capturing `register`)
//! 3. on failure, dispatch `on_failure`; success of the recovery handler
//!    swallows the failure, its failure escalates unless
//!    `continue_after_failure` is set
//!
//! Handlers are task sequences themselves, so dispatch recurses. The chain of
//! handlers being dispatched is tracked and re-entering one is an error.

use crate::engine::EngineSettings;
use crate::engine::executor::{CommandExecutor, CommandOutput, CommandRequest};
use crate::engine::run::Run;
use crate::error::{EngineError, Result};
use crate::hooks::{Hook, Task, Vars};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

type Step<'s> = Pin<Box<dyn Future<Output = Result<()>> + Send + 's>>;

pub(crate) struct Interpreter<'a> {
    run: &'a Run,
    hook: &'a Hook,
    executor: &'a dyn CommandExecutor,
    settings: &'a EngineSettings,
    chain: Vec<String>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        run: &'a Run,
        hook: &'a Hook,
        executor: &'a dyn CommandExecutor,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            run,
            hook,
            executor,
            settings,
            chain: Vec::new(),
        }
    }

    /// Run `tasks` in order with `inherited` vars bound into each of them
    ///
    /// An unrecovered failure stops the sequence unless the failing task has
    /// `continue_after_failure`. Definition errors always stop it.
    pub(crate) fn run_sequence<'s>(&'s mut self, tasks: &'a [Task], inherited: &'s Vars) -> Step<'s> {
        Box::pin(async move {
            for task in tasks {
                let Err(err) = self.run_task(task, inherited).await else {
                    continue;
                };
                if err.is_fatal() || !task.continue_after_failure {
                    return Err(err);
                }
                tracing::warn!(run = self.run.id(), task = task.display_name(), "Continuing after failure: {}", err);
                self.run
                    .log_info(&format!("Continue after failure of task {}", task.display_name()));
            }
            Ok(())
        })
    }

    fn run_task<'s>(&'s mut self, task: &'a Task, inherited: &'s Vars) -> Step<'s> {
        Box::pin(async move {
            tracing::debug!(run = self.run.id(), task = task.display_name(), "Running task");
            let locals = self.effective_vars(task, inherited);

            if let Some(guard) = task.only_if() {
                let command = self.run.resolve(guard, &locals);
                self.run.log_info(&format!("Running command {command}"));
                let result = self.execute(task, &command, &locals).await;
                self.run.set_exit_code(result.exit_code);
                self.run.log_output(&result.text());
                if !result.is_success() {
                    self.run
                        .log_info(&format!("Skipping step {}", task.display_name()));
                    return Ok(());
                }
            }

            let outcome = if let Some(handler) = task.handler() {
                self.dispatch(handler, &locals).await
            } else if let Some(command) = task.command() {
                self.run_command(task, command, &locals).await
            } else {
                Ok(())
            };

            match outcome {
                Ok(()) => Ok(()),
                Err(err) => self.recover(task, &locals, err).await,
            }
        })
    }

    /// Run handler `name` with the caller's vars bound into its tasks
    fn dispatch<'s>(&'s mut self, name: &'s str, caller_vars: &'s Vars) -> Step<'s> {
        Box::pin(async move {
            self.run.log_info(&format!("Running handler {name}"));
            let hook = self.hook;
            let Some(tasks) = hook.handler(name) else {
                self.run.log_error(&format!("Unknown handler {name}"));
                return Err(EngineError::UnknownHandler(name.to_string()));
            };

            if self.chain.iter().any(|active| active == name) {
                let chain = self
                    .chain
                    .iter()
                    .map(String::as_str)
                    .chain([name])
                    .collect::<Vec<_>>()
                    .join(" -> ");
                self.run.log_error(&format!("Handler cycle detected: {chain}"));
                return Err(EngineError::HandlerCycle { chain });
            }

            self.chain.push(name.to_string());
            let result = self.run_sequence(tasks, caller_vars).await;
            self.chain.pop();

            result.map_err(|source| {
                self.run.log_error(&format!("Failure in handler {name}"));
                EngineError::HandlerFailed {
                    handler: name.to_string(),
                    source: Box::new(source),
                }
            })
        })
    }

    async fn recover(&mut self, task: &'a Task, locals: &Vars, err: EngineError) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        let Some(recovery) = task.on_failure() else {
            return Err(err);
        };

        self.run.log_info(&format!(
            "Recovering error in step {} with handler {recovery}",
            task.display_name()
        ));
        match self.dispatch(recovery, locals).await {
            Ok(()) => {
                self.run
                    .log_info(&format!("Recovered step {} with handler {recovery}", task.display_name()));
                Ok(())
            }
            Err(recovery_err) if recovery_err.is_fatal() => Err(recovery_err),
            Err(recovery_err) => {
                let err = EngineError::RecoveryFailed {
                    handler: recovery.to_string(),
                    source: Box::new(recovery_err),
                };
                if task.continue_after_failure {
                    self.run
                        .log_info(&format!("Continue after failure of handler {recovery}"));
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn run_command(&mut self, task: &Task, command: &str, locals: &Vars) -> Result<()> {
        self.run
            .log_info(&format!("Step command {}", task.display_name()));
        let command = self.run.resolve(command, locals);
        let attempts = task.retry.saturating_add(1);

        let mut attempt = 1;
        let result = loop {
            self.run.log_info(&format!("Running command {command}"));
            let result = self.execute(task, &command, locals).await;
            self.run.set_exit_code(result.exit_code);
            self.run.log_output(&result.text());

            if result.is_success() || attempt >= attempts {
                break result;
            }
            attempt += 1;
            self.run.log_info(&format!(
                "Retrying step {} ({attempt}/{attempts})",
                task.display_name()
            ));
            if task.interval > 0 {
                tokio::time::sleep(Duration::from_secs(task.interval)).await;
            }
        };

        // Captured before failure handling so recovery handlers can read it
        if let Some(register) = task.register() {
            self.run
                .set_register(register, result.text().trim().to_string());
        }

        match result.failure {
            None => Ok(()),
            Some(failure) => {
                self.run.log_error(&format!(
                    "Command failed in step {}: {failure}",
                    task.display_name()
                ));
                Err(EngineError::StepFailed {
                    task: task.display_name().to_string(),
                    exit_code: result.exit_code,
                    reason: failure.to_string(),
                })
            }
        }
    }

    async fn execute(&self, task: &Task, command: &str, locals: &Vars) -> CommandOutput {
        let env = self.run.environment(locals);
        let cwd = task.cd().map(|cd| PathBuf::from(self.run.resolve(cd, locals)));
        self.executor
            .execute(CommandRequest {
                command,
                env: &env,
                cwd: cwd.as_deref(),
                timeout: task.timeout_or(self.settings.command_timeout),
            })
            .await
    }

    /// The task's own vars, resolved, overlaid with the vars bound by its caller
    fn effective_vars(&self, task: &Task, inherited: &Vars) -> Vars {
        let mut vars: Vars = task
            .vars
            .iter()
            .map(|(name, value)| (name.clone(), self.run.resolve(value, inherited)))
            .collect();
        vars.extend(inherited.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }
}
