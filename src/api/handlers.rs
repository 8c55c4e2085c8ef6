//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    state::AppState,
    timer::TimerStatus,
};
use super::responses::{ApiResponse, StatusResponse, HealthResponse};

/// Result type shared by the control endpoints
pub type ControlResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

/// Turn the outcome of a timer operation into an HTTP response
fn respond(
    state: &AppState,
    action: &str,
    done: &str,
    result: Result<TimerStatus, TimerError>,
) -> ControlResult {
    match result {
        Ok(timer) => {
            info!("{} endpoint called - timer is now {}", action, timer.mode);
            Ok(Json(ApiResponse::ok(format!("Timer {}", done), timer)))
        }
        Err(e) if e.is_invalid_state() => {
            warn!("Rejected {}: {}", action, e);
            Err((
                StatusCode::CONFLICT,
                Json(ApiResponse::error(e.to_string(), state.timer.status())),
            ))
        }
        Err(e) => {
            error!("Failed to {} timer: {}", action, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string(), state.timer.status())),
            ))
        }
    }
}

/// Handle POST /start - Start the timer
pub async fn start_handler(State(state): State<Arc<AppState>>) -> ControlResult {
    respond(&state, "start", "started", state.start())
}

/// Handle POST /pause - Pause the timer, keeping the rest of the interval
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> ControlResult {
    respond(&state, "pause", "paused", state.pause())
}

/// Handle POST /resume - Resume a paused timer
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> ControlResult {
    respond(&state, "resume", "resuming", state.resume())
}

/// Handle POST /invalidate - Stop the timer for good
pub async fn invalidate_handler(State(state): State<Arc<AppState>>) -> ControlResult {
    let timer = state.invalidate();
    respond(&state, "invalidate", "invalidated", Ok(timer))
}

/// Handle GET /status - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let ticks = match state.get_tick_state() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to get tick state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let errors = match state.get_errors() {
        Ok(errors) => errors,
        Err(e) => {
            error!("Failed to get reported errors: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer: state.timer.status(),
        ticks: ticks.count(),
        last_tick: ticks.last_tick(),
        errors,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
