pub mod config;
pub mod daemon;
pub mod metrics;
pub mod options;
pub mod orchestrator;
pub mod rpc;
pub mod task;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config,
    ConfigError, DaemonConfig, SanitizedConfig,
};
pub use daemon::{Aria2Client, DownloadDaemon, GlobalSpeed, OptionMap};
pub use options::{GlobalOptionCache, OptionScope, TaskOnlyOption};
pub use orchestrator::{
    BatchFailure, BatchReport, GlobalWrite, OptionChangeReport, Orchestrator, OrchestratorConfig,
    OrchestratorError,
};
pub use rpc::{DaemonEvent, DaemonEventKind, RpcError};
pub use task::{
    derive_name, is_metadata_only, CorrelationToken, TaskDescriptor, TaskFile, TaskStatus,
    TaskTracker,
};
