//! Option scoping and the global option cache.

mod cache;
mod scope;

pub use cache::GlobalOptionCache;
pub use scope::{OptionScope, TaskOnlyOption};
