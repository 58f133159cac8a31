//! Display names for tasks.

use std::path::{Component, Path};

use super::TaskDescriptor;

/// Placeholder path prefix the daemon uses for magnet tasks whose
/// metadata has not been fetched yet.
pub const METADATA_MARKER: &str = "[METADATA]";

/// Derive a human-meaningful name for a task. Never fails; returns an empty
/// string when nothing usable is known.
///
/// Priority: torrent name, then the `[METADATA]` placeholder path as-is,
/// then the top-level entry of the first file under `dir` (the folder of a
/// multi-file torrent or the file itself).
pub fn derive_name(task: &TaskDescriptor) -> String {
    if let Some(name) = task.bittorrent.as_ref().and_then(|bt| bt.name.as_deref()) {
        return name.to_string();
    }

    let Some(first) = task.files.first() else {
        return String::new();
    };

    if first.path.starts_with(METADATA_MARKER) {
        return first.path.clone();
    }

    top_level_entry(&first.path, &task.dir).unwrap_or_default()
}

/// True iff any file is a `[METADATA]` placeholder. Such a task is
/// provisional: the daemon will replace it with a new task under a new gid.
pub fn is_metadata_only(task: &TaskDescriptor) -> bool {
    task.files
        .iter()
        .any(|f| f.path.starts_with(METADATA_MARKER))
}

fn top_level_entry(path: &str, dir: &str) -> Option<String> {
    let relative = Path::new(path).strip_prefix(dir).ok()?;
    match relative.components().next()? {
        Component::Normal(entry) => Some(entry.to_string_lossy().into_owned()),
        _ => None,
    }
}
