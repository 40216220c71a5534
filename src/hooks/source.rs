use crate::error::{EngineError, Result};
use crate::hooks::Hook;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const HOOK_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Hooks stored as `<root>/<id>/<action>.yml`
#[derive(Debug, Clone)]
pub struct HookSource {
    root: PathBuf,
}

/// Listing entry for a hook found in a source directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookSummary {
    pub name: String,
    pub action: String,
    pub tasks: usize,
    pub handlers: usize,
}

impl HookSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load hook `id` with action `action`
    pub fn load(&self, id: &str, action: &str) -> Result<Hook> {
        let locator = format!("{id}/{action}");
        if !is_plain_segment(id) || !is_plain_segment(action) {
            return Err(EngineError::HookNotFound { locator });
        }

        let path = HOOK_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(id).join(format!("{action}.{ext}")))
            .find(|path| path.is_file())
            .ok_or(EngineError::HookNotFound { locator })?;

        let mut hook = load_hook_file(&path)?;
        hook.name = id.to_string();
        hook.action = action.to_string();
        Ok(hook)
    }

    /// Every hook below the root, sorted by id then action
    pub fn list(&self) -> Result<Vec<HookSummary>> {
        let mut summaries = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }
            let Some(id) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            for file in fs::read_dir(&dir)? {
                let path = file?.path();
                if !has_hook_extension(&path) {
                    continue;
                }
                let Some(action) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let hook = self.load(id, action)?;
                summaries.push(HookSummary {
                    name: hook.name,
                    action: hook.action,
                    tasks: hook.tasks.len(),
                    handlers: hook.handlers.len(),
                });
            }
        }

        summaries.sort_by(|a, b| (&a.name, &a.action).cmp(&(&b.name, &b.action)));
        Ok(summaries)
    }
}

/// Parse a single hook file; the name defaults to the file stem
pub fn load_hook_file<P: AsRef<Path>>(path: P) -> Result<Hook> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut hook: Hook =
        serde_yml::from_str(&content).map_err(|e| EngineError::InvalidHook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if hook.name.is_empty() {
        hook.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
    }
    Ok(hook)
}

fn has_hook_extension(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| HOOK_EXTENSIONS.contains(&e))
}

// Ids and actions come from URLs; keep them inside the root
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_hook(root: &Path, id: &str, file: &str, content: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_load_sets_name_and_action() {
        let temp_dir = TempDir::new().unwrap();
        write_hook(
            temp_dir.path(),
            "website",
            "deploy.yml",
            "tasks:\n  - command: \"echo hi\"\n",
        );

        let hook = HookSource::new(temp_dir.path())
            .load("website", "deploy")
            .expect("hook should load");
        assert_eq!(hook.name, "website");
        assert_eq!(hook.action, "deploy");
        assert_eq!(hook.locator(), "website/deploy");
        assert_eq!(hook.tasks.len(), 1);
    }

    #[test]
    fn test_load_accepts_yaml_extension() {
        let temp_dir = TempDir::new().unwrap();
        write_hook(temp_dir.path(), "db", "backup.yaml", "tasks: []\n");

        assert!(HookSource::new(temp_dir.path()).load("db", "backup").is_ok());
    }

    #[test]
    fn test_missing_hook_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = HookSource::new(temp_dir.path())
            .load("nope", "deploy")
            .unwrap_err();
        assert!(matches!(err, EngineError::HookNotFound { .. }));
    }

    #[test]
    fn test_path_traversal_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let source = HookSource::new(temp_dir.path());
        assert!(matches!(
            source.load("..", "passwd"),
            Err(EngineError::HookNotFound { .. })
        ));
        assert!(matches!(
            source.load("a/b", "c"),
            Err(EngineError::HookNotFound { .. })
        ));
    }

    #[test]
    fn test_strict_schema_reports_invalid_hook() {
        let temp_dir = TempDir::new().unwrap();
        write_hook(
            temp_dir.path(),
            "web",
            "deploy.yml",
            "tasks:\n  - name: a\n    unknown_key: 1\n",
        );

        let err = HookSource::new(temp_dir.path())
            .load("web", "deploy")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidHook { .. }));
        assert!(err.to_string().contains("Unable to validate yaml file"));
    }

    #[test]
    fn test_list_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        write_hook(temp_dir.path(), "web", "restart.yml", "tasks: []\n");
        write_hook(temp_dir.path(), "web", "deploy.yml", "tasks: []\n");
        write_hook(
            temp_dir.path(),
            "db",
            "backup.yml",
            "tasks:\n  - handler: dump\nhandlers:\n  dump: []\n",
        );
        write_hook(temp_dir.path(), "db", "README.md", "not a hook");

        let summaries = HookSource::new(temp_dir.path()).list().unwrap();
        let names: Vec<_> = summaries
            .iter()
            .map(|s| format!("{}/{}", s.name, s.action))
            .collect();
        assert_eq!(names, vec!["db/backup", "web/deploy", "web/restart"]);
        assert_eq!(summaries[0].tasks, 1);
        assert_eq!(summaries[0].handlers, 1);
    }

    #[test]
    fn test_load_hook_file_defaults_name_to_stem() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nightly.yml");
        fs::write(&path, "tasks: []\n").unwrap();

        let hook = load_hook_file(&path).unwrap();
        assert_eq!(hook.name, "nightly");
        assert_eq!(hook.action, "");
    }
}
