use super::*;
use crate::secrets::DEFAULT_SECRET_ENV_PREFIX;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_config_loads_defaults() {
    let settings = HookdConfig::from_toml("").settings().expect("Should load default config");

    assert_eq!(settings.listen_addr, "0.0.0.0:8080");
    assert_eq!(settings.shell, "/bin/sh");
    assert_eq!(settings.command_timeout(), Duration::from_secs(60));
    assert_eq!(settings.secret_env_prefix, DEFAULT_SECRET_ENV_PREFIX);
    assert!(settings.token.is_empty());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_overrides_win_over_defaults() {
    let config = HookdConfig::from_toml("token = \"abc\"\ncommand_timeout_secs = 5\n");
    let settings = config.settings().unwrap();

    assert_eq!(settings.token, "abc");
    assert_eq!(settings.engine_settings().command_timeout, Duration::from_secs(5));
    assert_eq!(config.get_section("shell").unwrap(), serde_json::json!("/bin/sh"));
}

#[test]
fn test_custom_config_file() {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(file, "shell: /bin/bash\nlisten_addr: 127.0.0.1:9000").unwrap();

    let config = HookdConfig::load_with_custom_config(Some(file.path())).unwrap();
    let full = config.get_full_config().unwrap();
    assert_eq!(full["shell"], "/bin/bash");
    assert_eq!(full["listen_addr"], "127.0.0.1:9000");
}

#[test]
fn test_missing_custom_config_is_an_error() {
    let result = HookdConfig::load_with_custom_config(Some(std::path::Path::new(
        "/nonexistent/hookd.toml",
    )));
    assert!(result.is_err());
}

#[test]
fn test_zero_timeout_is_rejected() {
    let settings = HookdConfig::from_toml("command_timeout_secs = 0").settings().unwrap();
    assert!(settings.validate().is_err());
}

#[test]
fn test_server_requires_token_and_config_dir() {
    let temp_dir = TempDir::new().unwrap();

    let no_token = HookdConfig::from_toml("").settings().unwrap();
    let err = no_token.validate_for_server().unwrap_err();
    assert!(err.to_string().contains("Empty token"));

    let no_dir = Settings {
        token: "t".to_string(),
        ..no_token.clone()
    };
    assert!(no_dir.validate_for_server().is_err());

    let ready = Settings {
        token: "t".to_string(),
        config_dir: temp_dir.path().to_path_buf(),
        ..no_token
    };
    assert!(ready.validate_for_server().is_ok());
}
