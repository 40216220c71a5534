use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Layered configuration sources
///
/// Lowest to highest: embedded defaults, `hookd.{toml,json,yaml,yml}` in the
/// working directory, an explicit config file, `HOOKD_*` environment variables.
pub struct HookdConfig {
    figment: Figment,
}

impl HookdConfig {
    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .merge(Toml::file("hookd.toml"))
            .merge(Json::file("hookd.json"))
            .merge(Yaml::file("hookd.yaml"))
            .merge(Yaml::file("hookd.yml"));

        if let Some(path) = custom_config {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        // Environment variables always have highest priority. `HOOKD_SECRET_*`
        // holds secrets, never settings.
        figment = figment.merge(
            Env::prefixed("HOOKD_")
                .filter(|key| !key.as_str().to_ascii_lowercase().starts_with("secret_")),
        );

        Ok(HookdConfig { figment })
    }

    /// Defaults merged with `overrides`, without touching files or the environment
    pub fn from_toml(overrides: &str) -> Self {
        HookdConfig {
            figment: Figment::new()
                .merge(Toml::string(DEFAULT_CONFIG))
                .merge(Toml::string(overrides)),
        }
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self.figment.extract_inner(path)?)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }

    pub fn settings(&self) -> Result<super::Settings> {
        self.figment
            .extract()
            .context("Failed to read hookd configuration")
    }
}
