//! Secret sources
//!
//! Secrets are merged into a run when it is created: from a YAML file of
//! `name: value` pairs and from prefixed environment variables
//! (`HOOKD_SECRET_DB_PASSWORD` becomes the secret `db_password`).

use crate::error::{EngineError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_SECRET_ENV_PREFIX: &str = "HOOKD_SECRET_";

/// Name to value mapping of secrets, immutable once bound to a run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretStore {
    entries: BTreeMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Merge `other` into this store; `other` wins on name collisions
    pub fn merge(&mut self, other: SecretStore) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// Never print values
impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Read a YAML mapping of string secrets
pub fn read_secret_file<P: AsRef<Path>>(path: P) -> Result<SecretStore> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let entries: BTreeMap<String, String> =
        serde_yml::from_str(&content).map_err(|e| EngineError::InvalidSecrets {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(SecretStore { entries })
}

/// Collect secrets from the process environment
pub fn read_secrets_from_env(prefix: &str) -> SecretStore {
    secrets_from_vars(std::env::vars(), prefix)
}

fn secrets_from_vars<I>(vars: I, prefix: &str) -> SecretStore
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_secret_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yml");
        fs::write(&path, "foo: bar\na: \"1\"\n").unwrap();

        let secrets = read_secret_file(&path).expect("secrets should load");
        assert_eq!(secrets.get("foo"), Some("bar"));
        assert_eq!(secrets.get("a"), Some("1"));
        assert_eq!(secrets.len(), 2);
    }

    #[test]
    fn test_read_secret_file_rejects_nested_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yml");
        fs::write(&path, "foo:\n  nested: value\n").unwrap();

        let err = read_secret_file(&path).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSecrets { .. }));
    }

    #[test]
    fn test_secrets_from_vars_strips_prefix_and_lowercases() {
        let vars = vec![
            ("HOOKD_SECRET_DB_PASSWORD".to_string(), "a=b=c".to_string()),
            ("HOOKD_SECRET_".to_string(), "ignored".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        let secrets = secrets_from_vars(vars, DEFAULT_SECRET_ENV_PREFIX);
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets.get("db_password"), Some("a=b=c"));
    }

    #[test]
    fn test_merge_prefers_later_source() {
        let mut secrets: SecretStore = [("token", "file"), ("user", "deploy")].into_iter().collect();
        secrets.merge([("token", "env")].into_iter().collect());

        assert_eq!(secrets.get("token"), Some("env"));
        assert_eq!(secrets.get("user"), Some("deploy"));
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets: SecretStore = [("token", "s3cr3t")].into_iter().collect();
        let debug = format!("{secrets:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("s3cr3t"));
    }
}
