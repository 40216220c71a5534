//! Placeholder interpolation
//!
//! Two placeholder families are recognized in commands, guards and task vars:
//!
//! - `${var.NAME}`: task-local vars, then registers, then hook-global vars
//! - `${secret.NAME}`: the run's secrets
//!
//! Substitution is a single pass. Substituted values are never rescanned, so
//! captured output cannot inject placeholders. Unknown names are left as-is.

use crate::hooks::Vars;
use crate::secrets::SecretStore;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(var|secret)\.([^}]+)\}")
        .expect("Failed to compile placeholder regex")
});

/// The values visible to one task at one point of a run
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub globals: &'a Vars,
    pub registers: &'a Vars,
    pub locals: &'a Vars,
    pub secrets: &'a SecretStore,
}

impl<'a> Scope<'a> {
    /// Look up `NAME` of `${var.NAME}`; precedence is fixed, not map order
    pub fn var(&self, name: &str) -> Option<&'a str> {
        self.locals
            .get(name)
            .or_else(|| self.registers.get(name))
            .or_else(|| self.globals.get(name))
            .map(String::as_str)
    }

    pub fn resolve(&self, input: &str) -> String {
        PLACEHOLDER
            .replace_all(input, |caps: &Captures<'_>| {
                let name = &caps[2];
                let value = match &caps[1] {
                    "var" => self.var(name),
                    _ => self.secrets.get(name),
                };
                value.unwrap_or(&caps[0]).to_string()
            })
            .into_owned()
    }

    /// Environment overlay for a command
    ///
    /// Layers are applied lowest first: hook-global vars, secrets, registers,
    /// task-local vars. Entries the OS cannot carry in an environment are
    /// left out so they cannot keep the command from starting.
    pub fn environment(&self) -> Vars {
        let mut env = Vars::new();
        overlay(&mut env, "var", pairs(self.globals));
        overlay(&mut env, "secret", self.secrets.iter());
        overlay(&mut env, "register", pairs(self.registers));
        overlay(&mut env, "var", pairs(self.locals));
        env
    }
}

fn pairs(vars: &Vars) -> impl Iterator<Item = (&str, &str)> {
    vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

fn overlay<'v>(env: &mut Vars, kind: &str, entries: impl Iterator<Item = (&'v str, &'v str)>) {
    for (name, value) in entries {
        if name.is_empty() || name.contains(['=', '\0']) || value.contains('\0') {
            tracing::warn!(kind, name = %name.escape_debug(), "Leaving out environment entry the OS cannot carry");
            continue;
        }
        env.insert(name.to_string(), value.to_string());
    }
}
