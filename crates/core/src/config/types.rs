use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Download daemon connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// RPC endpoint; the scheme selects the transport (ws, http, https).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// RPC secret, sent as `token:<secret>` with every call.
    #[serde(default)]
    pub secret: Option<String>,
    /// Per-call timeout. Unset means calls wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl DaemonConfig {
    /// Lowercased URL scheme of the endpoint, if any.
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.endpoint.split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "ws" => Some("ws"),
            "wss" => Some("wss"),
            "http" => Some("http"),
            "https" => Some("https"),
            _ => None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            secret: None,
            request_timeout_secs: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://localhost:6800/jsonrpc".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

/// Sanitized config for display (secret redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub daemon: SanitizedDaemonConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDaemonConfig {
    pub endpoint: String,
    pub secret_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            daemon: SanitizedDaemonConfig {
                endpoint: config.daemon.endpoint.clone(),
                secret_configured: config
                    .daemon
                    .secret
                    .as_ref()
                    .is_some_and(|s| !s.is_empty()),
                request_timeout_secs: config.daemon.request_timeout_secs,
                connect_timeout_secs: config.daemon.connect_timeout_secs,
            },
            orchestrator: config.orchestrator.clone(),
        }
    }
}
