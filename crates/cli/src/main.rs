mod cli;
mod output;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ariaherd_core::{
    load_config, load_default_config, metrics, validate_config, Config, DaemonEvent, Orchestrator,
    SanitizedConfig, TaskDescriptor, TaskStatus,
};

use cli::{Cli, Command};

/// Config file picked up from the working directory when --config is absent.
const DEFAULT_CONFIG_FILE: &str = "ariaherd.toml";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    if !cli.command.needs_daemon() {
        return print_config(&config);
    }

    let orchestrator = Orchestrator::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.daemon.endpoint))?;

    let result = execute(&orchestrator, &config, cli.command).await;
    orchestrator.close().await;

    if cli.dump_metrics {
        print!("{}", metrics::encode_metrics());
    }
    result
}

fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };

    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            debug!("No config file, using defaults and environment");
            load_default_config().context("Failed to load configuration")
        }
    }
}

fn print_config(config: &Config) -> Result<()> {
    let sanitized = SanitizedConfig::from(config);
    println!("{}", serde_json::to_string_pretty(&sanitized)?);
    Ok(())
}

async fn execute(orchestrator: &Orchestrator, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::List { json } => {
            let limit = orchestrator.config().waiting_limit;
            let tasks = orchestrator.list_active_and_waiting(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                for task in &tasks {
                    println!("{}", output::task_line(task));
                }
            }
        }
        Command::Speed => {
            let speed = orchestrator.overall_speed().await?;
            println!("{}", output::speed_line(&speed));
        }
        Command::PauseAll => {
            orchestrator.pause_all().await?;
        }
        Command::Remove { gid } => {
            match remove_by_gid(orchestrator, &gid).await? {
                RemoveOutcome::Removed => println!("Removed {}", gid),
                RemoveOutcome::ResultOnly => println!(
                    "{} is not live, only its result record was targeted",
                    gid
                ),
            }
        }
        Command::RemoveAll => {
            let report = orchestrator.remove_all().await?;
            for line in output::batch_summary("Removed", &report) {
                println!("{}", line);
            }
        }
        Command::SetOption { key, value } => {
            orchestrator
                .sync_global_options()
                .await
                .context("Failed to read global options")?;
            let report = orchestrator.change_option(&key, &value).await?;
            for line in output::option_summary(&key, &value, &report) {
                println!("{}", line);
            }
        }
        Command::Options => {
            orchestrator.sync_global_options().await?;
            let mut options: Vec<_> = orchestrator.global_options().await.into_iter().collect();
            options.sort();
            for (key, value) in options {
                println!("{}={}", key, value);
            }
        }
        Command::Config => print_config(config)?,
        Command::Watch { interval } => watch(orchestrator, interval).await?,
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum RemoveOutcome {
    Removed,
    ResultOnly,
}

/// Force-remove a live task by gid. A gid the daemon no longer lists as
/// live is treated as finished, so only its result record is dropped.
async fn remove_by_gid(orchestrator: &Orchestrator, gid: &str) -> Result<RemoveOutcome> {
    match orchestrator.find_live_task(gid).await? {
        Some(task) => {
            orchestrator.remove_one(&task).await?;
            Ok(RemoveOutcome::Removed)
        }
        None => {
            warn!(gid, "Task is not live, only its result record was targeted");
            let task = TaskDescriptor::new(gid, TaskStatus::Complete, "");
            orchestrator.remove_one(&task).await?;
            Ok(RemoveOutcome::ResultOnly)
        }
    }
}

async fn watch(orchestrator: &Orchestrator, interval: u64) -> Result<()> {
    watch_until(orchestrator, interval, signal::ctrl_c()).await
}

/// Print notifications and the overall speed until `shutdown` resolves.
async fn watch_until<F: Future>(
    orchestrator: &Orchestrator,
    interval: u64,
    shutdown: F,
) -> Result<()> {
    let mut events = orchestrator.subscribe_events().await;
    if events.is_none() {
        warn!("Transport carries no notifications, printing speed only");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping watch");
                break;
            }
            _ = ticker.tick() => {
                // A stalled daemon must not hold off Ctrl+C.
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested while reading speed, stopping watch");
                        break;
                    }
                    speed = orchestrator.overall_speed() => {
                        println!("{}", output::speed_line(&speed?));
                    }
                }
            }
            event = next_event(&mut events) => match event {
                Ok(event) => println!("{}", output::event_line(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed daemon notifications");
                }
                Err(RecvError::Closed) => {
                    warn!("Notification stream closed");
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Next notification, or never when there is no stream.
async fn next_event(
    events: &mut Option<broadcast::Receiver<DaemonEvent>>,
) -> Result<DaemonEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use ariaherd_core::testing::{fixtures, DaemonCall, MockDaemon};
    use ariaherd_core::OrchestratorConfig;

    fn orchestrator(daemon: &Arc<MockDaemon>, waiting_limit: u32) -> Orchestrator {
        Orchestrator::new(daemon.clone(), OrchestratorConfig { waiting_limit })
    }

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[daemon]\nendpoint = \"http://127.0.0.1:6800/jsonrpc\"\n\n[orchestrator]\nwaiting_limit = 50"
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.daemon.endpoint, "http://127.0.0.1:6800/jsonrpc");
        assert_eq!(config.orchestrator.waiting_limit, 50);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load(Some(path.as_path())).is_err());
    }

    #[tokio::test]
    async fn test_config_command_runs_without_daemon() {
        let daemon = Arc::new(MockDaemon::new());
        let orchestrator = orchestrator(&daemon, 10);

        execute(&orchestrator, &Config::default(), Command::Config)
            .await
            .unwrap();
        assert!(daemon.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_watch_stops_while_speed_call_hangs() {
        let daemon = Arc::new(MockDaemon::new());
        daemon.stall_method("getGlobalStat").await;
        let orchestrator = orchestrator(&daemon, 10);

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            watch_until(&orchestrator, 1, shutdown),
        )
        .await;

        assert!(matches!(stopped, Ok(Ok(()))));
        assert_eq!(daemon.calls_to("getGlobalStat").await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_gid_targets_result_only() {
        let daemon = Arc::new(MockDaemon::new());
        daemon.add_task(fixtures::active_task("a1")).await;
        let orchestrator = orchestrator(&daemon, 10);

        let outcome = remove_by_gid(&orchestrator, "gone").await.unwrap();

        assert_eq!(outcome, RemoveOutcome::ResultOnly);
        assert_eq!(
            daemon.calls_to("removeDownloadResult").await,
            vec![DaemonCall::RemoveResult("gone".to_string())]
        );
        assert!(daemon.calls_to("forceRemove").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_finds_waiting_task_beyond_first_page() {
        let daemon = Arc::new(MockDaemon::new());
        for gid in ["w1", "w2", "w3"] {
            daemon.add_task(fixtures::waiting_task(gid)).await;
        }
        let orchestrator = orchestrator(&daemon, 2);

        let outcome = remove_by_gid(&orchestrator, "w3").await.unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(
            daemon.calls_to("forceRemove").await,
            vec![DaemonCall::ForceRemove("w3".to_string())]
        );
    }
}
