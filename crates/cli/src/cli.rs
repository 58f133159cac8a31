//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Control an aria2 download daemon from the command line.
#[derive(Debug, Parser)]
#[command(name = "ariaherd", version, about)]
pub struct Cli {
    /// Config file. Defaults to ariaherd.toml when present.
    #[arg(long, short, global = true, env = "ARIAHERD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print collected metrics in Prometheus text format before exiting.
    #[arg(long, global = true)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List active then waiting tasks.
    List {
        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show aggregate download and upload speed.
    Speed,
    /// Pause every task.
    PauseAll,
    /// Remove one task by gid.
    Remove { gid: String },
    /// Pause, purge, and force-remove everything.
    RemoveAll,
    /// Apply an option to every unfinished task and, where allowed, as a
    /// global default.
    SetOption { key: String, value: String },
    /// Print the daemon's global options.
    Options,
    /// Print the effective configuration with secrets redacted.
    Config,
    /// Stream daemon notifications until Ctrl+C.
    Watch {
        /// Also print the overall speed every this many seconds.
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

impl Command {
    /// Whether the command talks to the daemon.
    pub fn needs_daemon(&self) -> bool {
        !matches!(self, Command::Config)
    }
}
