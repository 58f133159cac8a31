//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the orchestration facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How many waiting tasks bulk operations (remove all, option
    /// propagation) enumerate. Tasks queued beyond this are not touched.
    #[serde(default = "default_waiting_limit")]
    pub waiting_limit: u32,
}

fn default_waiting_limit() -> u32 {
    1000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            waiting_limit: default_waiting_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waiting_limit() {
        assert_eq!(OrchestratorConfig::default().waiting_limit, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrchestratorConfig = toml::from_str("waiting_limit = 20").unwrap();
        assert_eq!(config.waiting_limit, 20);

        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.waiting_limit, 1000);
    }
}
