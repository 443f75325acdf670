use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::scheduler::{notify_flag, run_action, DueAction};
use crate::state::{Location, NewRows, StateError};
use crate::upcoming::upcoming_action;
use crate::AppState;

type Reply = (StatusCode, Json<Value>);

#[derive(Deserialize)]
struct ToggleRequest {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct RowRef {
    id: u64,
}

#[derive(Deserialize)]
struct TimeUpdate {
    id: u64,
    time: String,
}

#[derive(Deserialize)]
struct LocationUpdate {
    id: u64,
    location: Location,
}

#[derive(Deserialize)]
struct TriggerRequest {
    action: Option<String>,
    location: Option<String>,
    telegram: Option<Value>,
    slack: Option<Value>,
    slack_status: Option<Value>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/toggle", post(toggle_flag))
        .route("/api/schedule", get(get_schedule))
        .route("/api/schedule/toggle", post(toggle_row))
        .route("/api/schedule/add", post(add_rows))
        .route("/api/schedule/remove", post(remove_row))
        .route("/api/schedule/update_time", post(update_time))
        .route("/api/schedule/update_location", post(update_location))
        .route("/api/trigger_now", post(trigger_now))
        .route("/api/scheduler_status", get(scheduler_status))
        .route("/api/serverinfo", get(server_info))
        .with_state(state)
}

fn failure(e: StateError) -> Reply {
    let status = match e {
        StateError::RowNotFound(_) => StatusCode::NOT_FOUND,
        StateError::UnknownKey(_) | StateError::InvalidValue { .. } | StateError::Missing(_) => {
            StatusCode::BAD_REQUEST
        }
        StateError::Io(_) | StateError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Request rejected ({status}): {e}");
    (
        status,
        Json(json!({ "success": false, "error": e.to_string() })),
    )
}

async fn get_state(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    debug!("Serving state with {} schedule rows", store.state().schedule.len());
    Json(json!(store.state()))
}

async fn toggle_flag(State(state): State<AppState>, Json(req): Json<ToggleRequest>) -> Reply {
    let mut store = state.store.lock().await;
    match store.set_flag(&req.key, &req.value) {
        Ok(()) => {
            info!("Flag {} set to {}", req.key, req.value);
            (
                StatusCode::OK,
                Json(json!({ "success": true, "state": store.state() })),
            )
        }
        Err(e) => failure(e),
    }
}

async fn get_schedule(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    Json(json!(store.state().schedule))
}

async fn toggle_row(State(state): State<AppState>, Json(req): Json<RowRef>) -> Reply {
    let mut store = state.store.lock().await;
    match store.toggle_row(req.id) {
        Ok(row) => {
            info!("Row {} is now {}", row.id, if row.enabled { "enabled" } else { "disabled" });
            (StatusCode::OK, Json(json!({ "success": true, "row": row })))
        }
        Err(e) => failure(e),
    }
}

async fn add_rows(State(state): State<AppState>, Json(req): Json<NewRows>) -> Reply {
    let mut store = state.store.lock().await;
    match store.add_rows(req) {
        Ok(rows) => {
            info!("Added {} schedule row(s)", rows.len());
            (StatusCode::OK, Json(json!({ "success": true, "rows": rows })))
        }
        Err(e) => failure(e),
    }
}

async fn remove_row(State(state): State<AppState>, Json(req): Json<RowRef>) -> Reply {
    let mut store = state.store.lock().await;
    match store.remove_row(req.id) {
        Ok(removed) => {
            if removed {
                info!("Removed row {}", req.id);
            } else {
                debug!("Nothing to remove for row {}", req.id);
            }
            (StatusCode::OK, Json(json!({ "success": removed })))
        }
        Err(e) => failure(e),
    }
}

async fn update_time(State(state): State<AppState>, Json(req): Json<TimeUpdate>) -> Reply {
    let mut store = state.store.lock().await;
    match store.update_time(req.id, req.time) {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({ "success": true, "id": row.id, "time": row.time })),
        ),
        Err(e) => failure(e),
    }
}

async fn update_location(State(state): State<AppState>, Json(req): Json<LocationUpdate>) -> Reply {
    let mut store = state.store.lock().await;
    match store.update_location(req.id, req.location) {
        Ok(row) => (
            StatusCode::OK,
            Json(json!({ "success": true, "id": row.id, "location": req.location })),
        ),
        Err(e) => failure(e),
    }
}

/// Runs an action right away, outside the schedule. Notification switches
/// that are not sent follow the current flags.
async fn trigger_now(State(state): State<AppState>, Json(req): Json<TriggerRequest>) -> Reply {
    let action = match req.action.map(|a| a.trim().to_string()) {
        Some(action) if !action.is_empty() => action,
        _ => return failure(StateError::Missing("action")),
    };
    let location = match req.location.as_deref().map(str::trim) {
        Some(location) if !location.is_empty() => match location.parse::<Location>() {
            Ok(location) => location,
            Err(e) => return failure(e),
        },
        _ => return failure(StateError::Missing("location")),
    };

    let due = {
        let store = state.store.lock().await;
        let flags = store.state();
        DueAction {
            row_id: None,
            action,
            location,
            telegram: notify_flag(req.telegram.as_ref(), flags.telegram_enabled),
            slack: notify_flag(req.slack.as_ref(), flags.slack_enabled),
            slack_status: notify_flag(req.slack_status.as_ref(), flags.slack_status_enabled),
        }
    };
    info!(
        "Manual trigger: {} at {} (telegram={}, slack={}, slack_status={})",
        due.action, due.location, due.telegram, due.slack, due.slack_status
    );

    let run = run_action(state.config.action_command(), &due).await;
    *state.last_action_result.lock().await = Some(run.summary.clone());

    let body = if run.success {
        json!({ "success": true, "result": run.summary })
    } else {
        json!({ "success": false, "error": run.summary })
    };
    (StatusCode::OK, Json(body))
}

async fn scheduler_status(State(state): State<AppState>) -> Json<Value> {
    let upcoming = {
        let store = state.store.lock().await;
        upcoming_action(&store.state().schedule, Local::now().naive_local())
    };
    let last_action_result = state.last_action_result.lock().await.clone();

    Json(json!({
        "upcoming_action": upcoming.map(|u| u.to_string()),
        "last_action_result": last_action_result,
    }))
}

async fn server_info(State(state): State<AppState>) -> Json<Value> {
    let uptime = Local::now().signed_duration_since(state.started_at);
    let minutes = uptime.num_minutes().max(0);

    Json(json!({
        "success": true,
        "start_time": state.started_at.to_rfc3339(),
        "uptime_days": minutes / (24 * 60),
        "uptime_hours": (minutes / 60) % 24,
        "uptime_minutes": minutes % 60,
    }))
}
