//! Task descriptors, display names, and correlation across gid changes.

mod name;
mod tracker;
mod types;

pub use name::{derive_name, is_metadata_only, METADATA_MARKER};
pub use tracker::{CorrelationToken, TaskTracker};
pub use types::*;
