//! Error types for the hook engine
//!
//! Definition errors (an unknown handler, a handler cycle) are fatal to a run.
//! Step, handler and recovery failures are recoverable through a task's
//! `on_failure` handler or its `continue_after_failure` flag.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A task dispatched a handler that the hook does not define
    #[error("Unknown handler {0}")]
    UnknownHandler(String),

    /// A handler was dispatched while already on the dispatch chain
    #[error("Handler cycle detected: {chain}")]
    HandlerCycle { chain: String },

    /// A command exited non-zero, timed out or could not be started
    #[error("Step '{task}' failed with exit code {exit_code}: {reason}")]
    StepFailed {
        task: String,
        exit_code: i32,
        reason: String,
    },

    /// A task of a handler body failed and was not recovered
    #[error("Failure in handler {handler}")]
    HandlerFailed {
        handler: String,
        #[source]
        source: Box<EngineError>,
    },

    /// The `on_failure` handler of a failing task failed as well
    #[error("Recovery handler {handler} failed")]
    RecoveryFailed {
        handler: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Hook not found: {locator}")]
    HookNotFound { locator: String },

    #[error("Unable to validate yaml file {}: {message}", path.display())]
    InvalidHook { path: PathBuf, message: String },

    #[error("Unable to validate secret file {}: {message}", path.display())]
    InvalidSecrets { path: PathBuf, message: String },

    #[error("run id not found: {0}")]
    RunNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Definition errors abort the run without consulting recovery settings
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::UnknownHandler(_) | EngineError::HandlerCycle { .. } => true,
            EngineError::HandlerFailed { source, .. }
            | EngineError::RecoveryFailed { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
