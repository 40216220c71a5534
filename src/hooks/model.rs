use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Named string values: hook-global vars, task-local vars, registers
pub type Vars = HashMap<String, String>;

/// A loaded runbook: top-level tasks plus a library of named handlers
///
/// Hooks are parsed strictly (unknown keys are rejected) and shared
/// read-only between runs once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hook {
    /// Hook id, taken from the directory name when loaded from a source
    #[serde(default)]
    pub name: String,

    /// Action name, taken from the file stem when loaded from a source
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub handlers: HashMap<String, Vec<Task>>,

    /// Hook-global variables, the lowest interpolation precedence
    #[serde(default)]
    pub vars: Vars,
}

/// One step of a hook or handler body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    #[serde(default)]
    pub name: String,

    /// Shell command, run through the configured shell
    #[serde(default)]
    pub command: Option<String>,

    /// Handler dispatched instead of a command
    #[serde(default)]
    pub handler: Option<String>,

    /// Guard command; a non-zero exit skips the task
    #[serde(default)]
    pub only_if: Option<String>,

    /// Recovery handler dispatched when the task fails
    #[serde(default)]
    pub on_failure: Option<String>,

    #[serde(default)]
    pub continue_after_failure: bool,

    /// Register receiving the trimmed command output
    #[serde(default)]
    pub register: Option<String>,

    /// Task-local variables, also bound into a dispatched handler's tasks
    #[serde(default)]
    pub vars: Vars,

    /// Working directory for the guard and the command
    #[serde(default)]
    pub cd: Option<String>,

    /// Per-task timeout in seconds, overriding the engine ceiling
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Extra attempts for a failing command
    #[serde(default)]
    pub retry: u32,

    /// Seconds to wait between attempts
    #[serde(default)]
    pub interval: u64,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl Task {
    pub fn command(&self) -> Option<&str> {
        non_empty(&self.command)
    }

    pub fn handler(&self) -> Option<&str> {
        non_empty(&self.handler)
    }

    pub fn only_if(&self) -> Option<&str> {
        non_empty(&self.only_if)
    }

    pub fn on_failure(&self) -> Option<&str> {
        non_empty(&self.on_failure)
    }

    pub fn register(&self) -> Option<&str> {
        non_empty(&self.register)
    }

    pub fn cd(&self) -> Option<&str> {
        non_empty(&self.cd)
    }

    /// Timeout for this task, falling back to the engine ceiling
    pub fn timeout_or(&self, ceiling: Duration) -> Duration {
        match self.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => ceiling,
        }
    }

    /// Label used in log lines
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(handler) = self.handler() {
            handler
        } else {
            self.command().unwrap_or("<noop>")
        }
    }
}

impl Hook {
    pub fn handler(&self, name: &str) -> Option<&[Task]> {
        self.handlers.get(name).map(Vec::as_slice)
    }

    /// `<name>/<action>` as used by the HTTP routes
    pub fn locator(&self) -> String {
        format!("{}/{}", self.name, self.action)
    }

    /// Handler names referenced by `handler` or `on_failure` that the hook does not define
    pub fn undefined_handlers(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .chain(self.handlers.values().flatten())
            .flat_map(|task| [task.handler(), task.on_failure()])
            .flatten()
            .filter(|name| !self.handlers.contains_key(*name))
            .map(str::to_string)
            .collect()
    }
}
