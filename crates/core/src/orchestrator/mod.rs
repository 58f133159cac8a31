//! Orchestration facade over the download daemon.
//!
//! The orchestrator owns one daemon connection and runs the bulk operations
//! callers need on top of it:
//! - **Enumeration**: active then waiting tasks, fetched concurrently
//! - **Removal**: one task by status, or everything (best effort, reported)
//! - **Options**: per-task propagation plus a write-through global cache

mod config;
mod service;
mod types;

pub use config::OrchestratorConfig;
pub use service::Orchestrator;
pub use types::{BatchFailure, BatchReport, GlobalWrite, OptionChangeReport, OrchestratorError};
