use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::state::{Location, PanelState};
use crate::upcoming::{parse_time, runs_on};
use crate::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct DueAction {
    /// `None` for manual triggers.
    pub row_id: Option<u64>,
    pub action: String,
    pub location: Location,
    pub telegram: bool,
    pub slack: bool,
    pub slack_status: bool,
}

/// Outcome of one action run. `summary` is what `scheduler_status` shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRun {
    pub success: bool,
    pub summary: String,
}

impl ActionRun {
    fn ok(due: &DueAction, detail: &str) -> Self {
        Self {
            success: true,
            summary: format!("OK: {} at {} - {}", due.action, due.location, detail),
        }
    }

    fn failed(due: &DueAction, detail: &str) -> Self {
        Self {
            success: false,
            summary: format!("FAILED: {} at {} - {}", due.action, due.location, detail),
        }
    }
}

/// Lets a due minute fire only once however many ticks land in it.
#[derive(Debug, Default)]
pub struct MinuteGuard {
    last: Option<(NaiveDate, u32, u32)>,
}

impl MinuteGuard {
    /// True the first time it is asked about the minute containing `now`.
    pub fn should_fire(&mut self, now: NaiveDateTime) -> bool {
        let minute = (now.date(), now.hour(), now.minute());
        if self.last == Some(minute) {
            return false;
        }
        self.last = Some(minute);
        true
    }
}

/// Reads a notification switch sent as a boolean, a number or a string such
/// as "yes", "on", "true" or "1". Absent or null keeps `fallback`.
pub fn notify_flag(value: Option<&Value>, fallback: bool) -> bool {
    match value {
        Some(Value::Bool(on)) => *on,
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "1" | "on"
        ),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Null) | None => fallback,
        Some(_) => true,
    }
}

/// Rows that should fire during the minute containing `now`. Nothing is due
/// while updates are disabled.
pub fn due_actions(state: &PanelState, now: NaiveDateTime) -> Vec<DueAction> {
    if !state.updates_enabled {
        return Vec::new();
    }

    let weekday = now.weekday();
    state
        .schedule
        .iter()
        .filter(|row| row.enabled && runs_on(row, weekday))
        .filter(|row| {
            parse_time(&row.time).is_some_and(|t| t.hour() == now.hour() && t.minute() == now.minute())
        })
        .map(|row| DueAction {
            row_id: Some(row.id),
            action: row.action.clone(),
            location: row.location.unwrap_or(state.location),
            telegram: state.telegram_enabled,
            slack: state.slack_enabled,
            slack_status: state.slack_status_enabled,
        })
        .collect()
}

/// Runs `command <action> --location <location>` and describes the outcome.
pub async fn run_action(command: Option<&str>, due: &DueAction) -> ActionRun {
    let mut parts = command.unwrap_or_default().split_whitespace();
    let Some(program) = parts.next() else {
        info!(
            "Action {} at {} is due (no action_command configured)",
            due.action, due.location
        );
        return ActionRun::ok(due, "logged only");
    };

    let flag = |on: bool| if on { "YES" } else { "NO" };

    info!("Running {} at {} via {}", due.action, due.location, program);
    let output = Command::new(program)
        .args(parts)
        .arg(&due.action)
        .arg("--location")
        .arg(due.location.as_str())
        .env("TELEGRAM_NOTIFY", flag(due.telegram))
        .env("SLACK_NOTIFY", flag(due.slack))
        .env("SLACK_STATUS", flag(due.slack_status))
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!("Action output: {stdout}");
            ActionRun::ok(due, if stdout.is_empty() { "No output" } else { stdout.as_str() })
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Action {} failed with {}: {}", due.action, output.status, stderr);
            ActionRun::failed(
                due,
                if stderr.is_empty() { "No error details" } else { stderr.as_str() },
            )
        }
        Err(e) => {
            error!("Failed to start {program}: {e}");
            ActionRun::failed(due, &e.to_string())
        }
    }
}

pub async fn scheduler_loop(state: AppState, cancel: CancellationToken) {
    let mut interval = time::interval(Duration::from_secs(state.config.check_interval_secs));
    let mut guard = MinuteGuard::default();

    info!(
        "Scheduler running every {}s",
        state.config.check_interval_secs
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduler stopped");
                break;
            }
            _ = interval.tick() => {}
        }

        let now = Local::now().naive_local();
        let due = {
            let store = state.store.lock().await;
            due_actions(store.state(), now)
        };
        if due.is_empty() || !guard.should_fire(now) {
            continue;
        }

        for action in &due {
            let run = run_action(state.config.action_command(), action).await;
            *state.last_action_result.lock().await = Some(run.summary);
        }
    }
}
