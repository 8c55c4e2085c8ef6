//! HTTP control surface tests, driven on virtual time

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use clap::Parser as _;
use serde_json::Value;
use tower::ServiceExt;

use pausable_timer::{create_router, AppState, Config, ManualClock, ManualScheduler};

struct TestApp {
    state: Arc<AppState>,
    scheduler: Arc<ManualScheduler>,
    router: Router,
}

impl TestApp {
    fn new(args: &[&str]) -> Self {
        let config = Config::try_parse_from(std::iter::once("pausable-timer").chain(args.iter().copied()))
            .expect("valid arguments");
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
        let state = Arc::new(AppState::new(&config, scheduler.clone(), clock).expect("valid timer"));
        let router = create_router(Arc::clone(&state));
        Self {
            state,
            scheduler,
            router,
        }
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn advance(&self, millis: u64) {
        self.scheduler.advance(Duration::from_millis(millis));
    }
}

#[tokio::test]
async fn pause_before_start_is_a_conflict() {
    let app = TestApp::new(&[]);

    let (status, body) = app.call("POST", "/pause").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "cannot pause a timer that is idle");
    assert_eq!(body["timer"]["mode"], "idle");
}

#[tokio::test]
async fn start_then_status_reports_ticks() {
    let app = TestApp::new(&["--interval-ms", "1000"]);

    let (status, body) = app.call("POST", "/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Timer started");
    assert_eq!(body["timer"]["mode"], "running");

    app.advance(2500);

    let (status, body) = app.call("GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticks"], 2);
    assert_eq!(body["timer"]["fire_count"], 2);
    assert_eq!(body["timer"]["next_fire_in_ms"], 500);
    assert_eq!(body["last_action"], "start");
    assert!(body["last_tick"].is_string());
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let app = TestApp::new(&["--interval-ms", "1000"]);

    app.call("POST", "/start").await;
    app.advance(300);

    let (status, body) = app.call("POST", "/pause").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["mode"], "paused");
    assert_eq!(body["timer"]["remaining_at_pause_ms"], 700);

    let (status, body) = app.call("POST", "/resume").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["resuming"], true);

    let (status, _) = app.call("POST", "/resume").await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.advance(700);
    let (_, body) = app.call("GET", "/status").await;
    assert_eq!(body["ticks"], 1);
    assert_eq!(body["timer"]["mode"], "running");
    assert_eq!(body["last_action"], "resume");
}

#[tokio::test]
async fn once_flag_expires_after_single_fire() {
    let app = TestApp::new(&["--interval-ms", "200", "--once"]);

    app.call("POST", "/start").await;
    app.advance(1000);

    let (_, body) = app.call("GET", "/status").await;
    assert_eq!(body["ticks"], 1);
    assert_eq!(body["timer"]["mode"], "expired");
    assert_eq!(body["timer"]["repeats"], false);
}

#[tokio::test]
async fn invalidate_is_idempotent_and_final() {
    let app = TestApp::new(&[]);

    app.call("POST", "/start").await;
    let (first, body) = app.call("POST", "/invalidate").await;
    let (second, _) = app.call("POST", "/invalidate").await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["timer"]["mode"], "invalidated");

    let (status, _) = app.call("POST", "/start").await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.advance(5000);
    assert_eq!(app.state.get_tick_state().unwrap().count(), 0);
}

#[tokio::test]
async fn fires_are_published_on_the_tick_channel() {
    let app = TestApp::new(&["--interval-ms", "100"]);
    let mut ticks = app.state.tick_tx.subscribe();

    app.state.start().unwrap();
    app.advance(250);

    assert_eq!(ticks.try_recv().unwrap().sequence, 1);
    assert_eq!(ticks.try_recv().unwrap().sequence, 2);
    assert!(ticks.try_recv().is_err());
}

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::new(&[]);

    let (status, body) = app.call("GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
