//! Tick logging background task

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Background task that logs every fire published by the timer callback
pub async fn tick_logger_task(state: Arc<AppState>) {
    info!("Starting tick logger task");

    let mut tick_rx = state.tick_tx.subscribe();

    loop {
        match tick_rx.recv().await {
            Ok(event) => {
                info!("Tick #{} at {}", event.sequence, event.fired_at.to_rfc3339());
                match serde_json::to_string(&event) {
                    Ok(json) => debug!("Tick event: {}", json),
                    Err(e) => warn!("Failed to serialize tick event: {}", e),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Tick logger fell behind, skipped {} ticks", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Tick channel closed, stopping tick logger");
                break;
            }
        }
    }
}
