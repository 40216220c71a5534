//! Hook definitions and the directory source they are loaded from
//!
//! A hook is a YAML runbook: an ordered list of tasks and a library of named
//! handlers that tasks can dispatch, either directly or as recovery:
//!
//! ```yaml
//! vars:
//!   service: "api"
//! tasks:
//!   - name: current release
//!     command: "readlink /srv/${var.service}/current"
//!     register: release
//!   - name: restart
//!     only_if: "systemctl is-enabled ${var.service}"
//!     command: "systemctl restart ${var.service}"
//!     on_failure: rollback
//! handlers:
//!   rollback:
//!     - command: "ln -sfn ${var.release} /srv/${var.service}/current"
//! ```
//!
//! Hooks served over HTTP live at `<config_dir>/<id>/<action>.yml`.

mod model;
mod source;

pub use model::{Hook, Task, Vars};
pub use source::{HookSource, HookSummary, load_hook_file};
