use crate::engine::interpolate::Scope;
use crate::engine::redact::Redactor;
use crate::hooks::{Hook, Vars};
use crate::secrets::SecretStore;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use uuid::Uuid;

/// One execution of a hook
///
/// Written only by the task driving the run; readable from anywhere while it
/// executes. Everything appended to the log has been through the redactor.
#[derive(Debug)]
pub struct Run {
    id: String,
    hook: Arc<Hook>,
    secrets: SecretStore,
    redactor: Redactor,
    registers: RwLock<Vars>,
    state: RwLock<RunState>,
    done: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct RunState {
    log: String,
    exit_code: i32,
    completed: bool,
}

/// Point-in-time view of a run's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub id: String,
    pub completed: bool,
    pub exit_code: i32,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Run {
    pub fn new(hook: Arc<Hook>, secrets: SecretStore) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: Uuid::now_v7().to_string(),
            redactor: Redactor::new(&secrets),
            hook,
            secrets,
            registers: RwLock::new(Vars::new()),
            state: RwLock::new(RunState::default()),
            done,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hook(&self) -> &Arc<Hook> {
        &self.hook
    }

    pub fn is_completed(&self) -> bool {
        read(&self.state).completed
    }

    /// Exit code of the most recently executed command
    pub fn exit_code(&self) -> i32 {
        read(&self.state).exit_code
    }

    /// The redacted log so far
    pub fn log(&self) -> String {
        read(&self.state).log.clone()
    }

    pub fn register(&self, name: &str) -> Option<String> {
        read(&self.registers).get(name).cloned()
    }

    pub fn registers(&self) -> Vars {
        read(&self.registers).clone()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let state = read(&self.state);
        RunSnapshot {
            id: self.id.clone(),
            completed: state.completed,
            exit_code: state.exit_code,
        }
    }

    /// Wait until the run has completed
    pub async fn wait(&self) {
        let mut done = self.done.subscribe();
        // Err only if the sender is gone, and the sender lives in `self`
        let _ = done.wait_for(|completed| *completed).await;
    }

    pub(crate) fn resolve(&self, input: &str, locals: &Vars) -> String {
        let registers = read(&self.registers);
        self.scope(&registers, locals).resolve(input)
    }

    pub(crate) fn environment(&self, locals: &Vars) -> Vars {
        let registers = read(&self.registers);
        self.scope(&registers, locals).environment()
    }

    fn scope<'a>(&'a self, registers: &'a Vars, locals: &'a Vars) -> Scope<'a> {
        Scope {
            globals: &self.hook.vars,
            registers,
            locals,
            secrets: &self.secrets,
        }
    }

    pub(crate) fn set_register(&self, name: &str, value: String) {
        write(&self.registers).insert(name.to_string(), value);
    }

    pub(crate) fn set_exit_code(&self, exit_code: i32) {
        write(&self.state).exit_code = exit_code;
    }

    /// Append raw command output, newline terminated
    pub(crate) fn log_output(&self, output: &str) {
        if output.is_empty() {
            return;
        }
        let mut text = self.redactor.redact(output);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        write(&self.state).log.push_str(&text);
    }

    pub(crate) fn log_info(&self, message: &str) {
        self.log_output(&format!("[INFO] {message}\n"));
    }

    pub(crate) fn log_error(&self, message: &str) {
        self.log_output(&format!("[ERROR] {message}\n"));
    }

    pub(crate) fn complete(&self) {
        write(&self.state).completed = true;
        self.done.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_with_secret(name: &str, value: &str) -> Run {
        Run::new(
            Arc::new(Hook::default()),
            [(name, value)].into_iter().collect(),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let hook = Arc::new(Hook::default());
        let a = Run::new(hook.clone(), SecretStore::new());
        let b = Run::new(hook, SecretStore::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_every_log_path_is_redacted() {
        let run = run_with_secret("foo", "123");
        run.log_info("Running command echo secret:123");
        run.log_output("secret:123");
        run.log_error("failed with 123");

        let log = run.log();
        assert!(!log.contains("123"));
        assert_eq!(
            log,
            "[INFO] Running command echo secret:***\nsecret:***\n[ERROR] failed with ***\n"
        );
    }

    #[test]
    fn test_registers_keep_raw_values() {
        let run = run_with_secret("foo", "123");
        run.set_register("out", "secret:123".to_string());
        assert_eq!(run.register("out").as_deref(), Some("secret:123"));
    }

    #[test]
    fn test_resolve_reads_registers() {
        let run = run_with_secret("token", "t");
        run.set_register("release", "v2".to_string());
        assert_eq!(
            run.resolve("deploy ${var.release} ${secret.token}", &Vars::new()),
            "deploy v2 t"
        );
    }

    #[test]
    fn test_snapshot() {
        let run = run_with_secret("a", "b");
        run.set_exit_code(2);
        let snapshot = run.snapshot();
        assert_eq!(snapshot.id, run.id());
        assert_eq!(snapshot.exit_code, 2);
        assert!(!snapshot.completed);
    }

    #[tokio::test]
    async fn test_wait_returns_after_completion() {
        let run = Arc::new(run_with_secret("a", "b"));
        let waiter = {
            let run = run.clone();
            tokio::spawn(async move { run.wait().await })
        };

        run.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait should return")
            .unwrap();

        // Already completed runs return immediately
        tokio::time::timeout(Duration::from_secs(1), run.wait())
            .await
            .expect("wait should return");
        assert!(run.is_completed());
    }
}
