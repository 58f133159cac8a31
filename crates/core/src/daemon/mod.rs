//! Download daemon abstraction.
//!
//! This module provides a `DownloadDaemon` trait describing the daemon calls
//! the orchestration layer relies on, and its aria2 implementation.

mod aria2;
mod types;

pub use aria2::Aria2Client;
pub use types::*;
