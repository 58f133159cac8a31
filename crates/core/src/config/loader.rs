use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable prefix for overrides, e.g. `ARIAHERD_DAEMON_ENDPOINT`.
const ENV_PREFIX: &str = "ARIAHERD_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load built-in defaults with environment variable overrides (no file)
pub fn load_default_config() -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

// Only the first `_` after the section name splits, so keys such as
// `ARIAHERD_DAEMON_CONNECT_TIMEOUT_SECS` map to `daemon.connect_timeout_secs`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        key.as_str()
            .replacen('_', ".", 1)
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[daemon]
endpoint = "ws://127.0.0.1:6801/jsonrpc"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.daemon.endpoint, "ws://127.0.0.1:6801/jsonrpc");
        assert_eq!(config.orchestrator.waiting_limit, 1000);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[orchestrator]
waiting_limit = "lots"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/ariaherd.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[daemon]
endpoint = "http://127.0.0.1:6800/jsonrpc"
secret = "abc"

[orchestrator]
waiting_limit = 50
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.daemon.endpoint, "http://127.0.0.1:6800/jsonrpc");
        assert_eq!(config.daemon.secret.as_deref(), Some("abc"));
        assert_eq!(config.daemon.connect_timeout_secs, 10);
        assert_eq!(config.orchestrator.waiting_limit, 50);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ariaherd.toml",
                r#"
[daemon]
endpoint = "ws://file:6800/jsonrpc"
"#,
            )?;
            jail.set_env("ARIAHERD_DAEMON_ENDPOINT", "ws://env:6800/jsonrpc");
            jail.set_env("ARIAHERD_DAEMON_CONNECT_TIMEOUT_SECS", "3");

            let config = load_config(Path::new("ariaherd.toml")).expect("config loads");
            assert_eq!(config.daemon.endpoint, "ws://env:6800/jsonrpc");
            assert_eq!(config.daemon.connect_timeout_secs, 3);
            Ok(())
        });
    }
}
