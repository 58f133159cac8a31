//! Which daemon options may become global defaults.

use serde::{Deserialize, Serialize};

/// Where an option change applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionScope {
    /// Only meaningful per task; never written as a global default.
    TaskOnly,
    /// Applied to current tasks and written as the global default.
    GlobalAndTask,
}

impl OptionScope {
    /// Scope of an option key. Keys not listed in [`TaskOnlyOption`] are
    /// global-and-task.
    pub fn of(key: &str) -> Self {
        match TaskOnlyOption::from_key(key) {
            Some(_) => OptionScope::TaskOnly,
            None => OptionScope::GlobalAndTask,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, OptionScope::GlobalAndTask)
    }
}

/// Options that only make sense for one task, e.g. `select-file` indexes the
/// files of one particular torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOnlyOption {
    Checksum,
    IndexOut,
    Out,
    Pause,
    SelectFile,
}

impl TaskOnlyOption {
    pub const ALL: [TaskOnlyOption; 5] = [
        TaskOnlyOption::Checksum,
        TaskOnlyOption::IndexOut,
        TaskOnlyOption::Out,
        TaskOnlyOption::Pause,
        TaskOnlyOption::SelectFile,
    ];

    /// Daemon option key.
    pub fn key(&self) -> &'static str {
        match self {
            TaskOnlyOption::Checksum => "checksum",
            TaskOnlyOption::IndexOut => "index-out",
            TaskOnlyOption::Out => "out",
            TaskOnlyOption::Pause => "pause",
            TaskOnlyOption::SelectFile => "select-file",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "checksum" => Some(TaskOnlyOption::Checksum),
            "index-out" => Some(TaskOnlyOption::IndexOut),
            "out" => Some(TaskOnlyOption::Out),
            "pause" => Some(TaskOnlyOption::Pause),
            "select-file" => Some(TaskOnlyOption::SelectFile),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_only_keys_round_trip() {
        for option in TaskOnlyOption::ALL {
            assert_eq!(TaskOnlyOption::from_key(option.key()), Some(option));
            assert_eq!(OptionScope::of(option.key()), OptionScope::TaskOnly);
        }
    }

    #[test]
    fn test_other_keys_are_global() {
        for key in ["bt-max-peers", "max-download-limit", "dir", "seed-ratio"] {
            assert_eq!(OptionScope::of(key), OptionScope::GlobalAndTask);
            assert!(OptionScope::of(key).is_global());
        }
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        assert_eq!(OptionScope::of("Select-File"), OptionScope::GlobalAndTask);
    }
}
