use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Daemon endpoint uses a supported scheme (ws, http, https)
/// - Connect timeout is not 0
/// - Orchestrator waiting limit is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match config.daemon.scheme() {
        Some("ws") | Some("http") | Some("https") => {}
        Some("wss") => {
            return Err(ConfigError::ValidationError(
                "daemon.endpoint: wss is not supported, use ws or https".to_string(),
            ))
        }
        _ => {
            return Err(ConfigError::ValidationError(format!(
                "daemon.endpoint must be a ws://, http:// or https:// URL, got {:?}",
                config.daemon.endpoint
            )))
        }
    }

    if config.daemon.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "daemon.connect_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.waiting_limit == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.waiting_limit cannot be 0".to_string(),
        ));
    }

    Ok(())
}
