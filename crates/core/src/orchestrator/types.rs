//! Types for the orchestration facade.

use serde::Serialize;
use thiserror::Error;

use crate::rpc::RpcError;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The daemon could not be reached, or the connection dropped.
    #[error("daemon connection error: {0}")]
    Connection(RpcError),

    /// The daemon rejected a call or answered with something unusable.
    #[error("daemon rpc error: {0}")]
    Rpc(RpcError),

    /// Per-task options were already changed but the matching global
    /// default was rejected, so new tasks will not inherit the value.
    #[error("global option {key} was not applied after task options changed: {source}")]
    InvariantViolation {
        key: String,
        #[source]
        source: RpcError,
    },
}

impl OrchestratorError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, OrchestratorError::Connection(_))
    }
}

impl From<RpcError> for OrchestratorError {
    fn from(err: RpcError) -> Self {
        if err.is_connection_error() {
            OrchestratorError::Connection(err)
        } else {
            OrchestratorError::Rpc(err)
        }
    }
}

/// A task a bulk operation could not act on.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub gid: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: RpcError,
}

fn serialize_error<S: serde::Serializer>(err: &RpcError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// Outcome of a best-effort bulk operation.
///
/// Individual failures are collected here instead of failing the call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Gids the operation succeeded on.
    pub succeeded: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    /// No task failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, gid: String, result: Result<(), RpcError>) {
        match result {
            Ok(()) => self.succeeded.push(gid),
            Err(error) => self.failures.push(BatchFailure { gid, error }),
        }
    }
}

/// What happened to the global default during an option change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalWrite {
    /// Written to the daemon and cached.
    Applied,
    /// The key only exists per task.
    Skipped,
}

/// Outcome of `Orchestrator::change_option`.
#[derive(Debug, Clone, Serialize)]
pub struct OptionChangeReport {
    pub tasks: BatchReport,
    pub global: GlobalWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rpc_error_sorts_by_class() {
        let err: OrchestratorError = RpcError::ConnectionClosed.into();
        assert!(err.is_connection_error());

        let err: OrchestratorError = RpcError::NotConnected.into();
        assert!(matches!(err, OrchestratorError::Connection(_)));

        let err: OrchestratorError = RpcError::daemon(1, "GID not found").into();
        assert!(matches!(err, OrchestratorError::Rpc(_)));

        let err: OrchestratorError = RpcError::InvalidResponse("bad".to_string()).into();
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_batch_report_record() {
        let mut report = BatchReport::default();
        assert!(report.is_clean());
        assert_eq!(report.total(), 0);

        report.record("a".to_string(), Ok(()));
        report.record("b".to_string(), Err(RpcError::daemon(1, "nope")));

        assert_eq!(report.total(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.succeeded, vec!["a".to_string()]);
        assert_eq!(report.failures[0].gid, "b");
    }

    #[test]
    fn test_batch_report_serialization() {
        let mut report = BatchReport::default();
        report.record("b".to_string(), Err(RpcError::Timeout));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["gid"], "b");
        assert!(json["failures"][0]["error"].is_string());
    }

    #[test]
    fn test_global_write_serialization() {
        let json = serde_json::to_string(&GlobalWrite::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }

    #[test]
    fn test_invariant_violation_message() {
        let err = OrchestratorError::InvariantViolation {
            key: "bt-max-peers".to_string(),
            source: RpcError::daemon(1, "rejected"),
        };
        assert!(err.to_string().contains("bt-max-peers"));
    }
}
