//! Pausable Timer - HTTP control daemon
//!
//! This is the main entry point for the pausable-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use pausable_timer::{
    config::Config,
    state::AppState,
    api::create_router,
    tasks::tick_logger_task,
    timer::{MonotonicClock, TokioScheduler},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("pausable_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting pausable-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, interval={}ms, repeats={}",
          config.host, config.port, config.interval_ms, config.repeats());

    // Create application state; the timer runs on this runtime
    let scheduler = Arc::new(TokioScheduler::current());
    let state = Arc::new(AppState::new(&config, scheduler, Arc::new(MonotonicClock))?);

    // Log every fire in the background
    let logger_state = Arc::clone(&state);
    tokio::spawn(async move {
        tick_logger_task(logger_state).await;
    });

    if config.autostart {
        state.start()?;
    }

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start      - Start the timer");
    info!("  POST /pause      - Pause, keeping the rest of the interval");
    info!("  POST /resume     - Resume from where it was paused");
    info!("  POST /invalidate - Stop the timer for good");
    info!("  GET  /status     - Timer status and tick count");
    info!("  GET  /health     - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.invalidate();
    info!("Server shutdown complete");
    Ok(())
}
