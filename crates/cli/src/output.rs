//! Human-readable rendering of command results.

use ariaherd_core::{BatchReport, DaemonEvent, GlobalSpeed, OptionChangeReport, TaskDescriptor};

/// Format a byte rate with a binary unit.
pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn task_line(task: &TaskDescriptor) -> String {
    let name = task.name();
    let name = if name.is_empty() { "-" } else { name.as_str() };
    format!(
        "{:<16}  {:<8}  {:>5.1}%  {:>12}  {}",
        task.gid,
        task.status.as_str(),
        task.progress() * 100.0,
        format_rate(task.download_speed),
        name
    )
}

pub fn speed_line(speed: &GlobalSpeed) -> String {
    format!(
        "down {}  up {}",
        format_rate(speed.download_speed),
        format_rate(speed.upload_speed)
    )
}

pub fn event_line(event: &DaemonEvent) -> String {
    format!(
        "{}  {:<20}  {}",
        event.received_at.format("%H:%M:%S"),
        event.kind.as_str(),
        event.gid
    )
}

pub fn batch_summary(action: &str, report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} of {} tasks",
        action,
        report.succeeded.len(),
        report.total()
    )];
    lines.extend(
        report
            .failures
            .iter()
            .map(|failure| format!("  {}: {}", failure.gid, failure.error)),
    );
    lines
}

pub fn option_summary(key: &str, value: &str, report: &OptionChangeReport) -> Vec<String> {
    let mut lines = batch_summary(&format!("Set {}={} on", key, value), &report.tasks);
    lines.push(format!("Global default: {:?}", report.global).to_lowercase());
    lines
}
