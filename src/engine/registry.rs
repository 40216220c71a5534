use crate::engine::run::Run;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Runs by id
///
/// Entries are inserted when a run is created and never evicted, so memory
/// grows with the number of runs for the lifetime of the process.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Arc<Run>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, run: Arc<Run>) {
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run.id().to_string(), run);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Run>> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Runs of the hook `locator` (`<name>/<action>`), oldest first
    pub fn list(&self, locator: &str) -> Vec<Arc<Run>> {
        let mut runs: Vec<_> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|run| run.hook().locator() == locator)
            .cloned()
            .collect();
        // v7 ids sort by creation time
        runs.sort_by(|a, b| a.id().cmp(b.id()));
        runs
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
