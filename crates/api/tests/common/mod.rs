#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use cookbook_api::config::ServerConfig;
use cookbook_api::engine::{SimulatedConfig, SimulatedExecutor};
use cookbook_api::router::build_app_router;
use cookbook_api::state::AppState;
use cookbook_api::ws::WsManager;
use cookbook_events::EventBus;
use cookbook_pipeline::{BootstrapCoordinator, PipelineConfig, RefineCoordinator};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        heartbeat_interval_secs: 30,
    }
}

/// Build the shared state around a simulated executor.
pub fn test_state(simulated: SimulatedConfig) -> AppState {
    let event_bus = Arc::new(EventBus::default());
    let executor = Arc::new(SimulatedExecutor::new(simulated));
    let pipeline = PipelineConfig {
        max_concurrency: 2,
        task_timeout: Duration::from_secs(30),
    };

    AppState {
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::clone(&event_bus),
        bootstrap: BootstrapCoordinator::new(
            Arc::clone(&event_bus),
            executor.clone(),
            executor.clone(),
            pipeline.clone(),
        ),
        refine: RefineCoordinator::new(event_bus, executor, pipeline),
    }
}

/// Build the full application router with an instant simulated executor.
///
/// Returns the state too, so tests can share coordinators across requests.
pub fn build_test_app() -> (Router, AppState) {
    build_test_app_with(SimulatedConfig::instant())
}

pub fn build_test_app_with(simulated: SimulatedConfig) -> (Router, AppState) {
    let state = test_state(simulated);
    let app = build_app_router(state.clone(), &test_config());
    (app, state)
}

/// A simulated executor slow enough that a run is still going when the
/// next request arrives.
pub fn slow_executor() -> SimulatedConfig {
    SimulatedConfig {
        task_delay: Duration::from_secs(10),
        ..SimulatedConfig::instant()
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `uri` until `data.status` equals one of `statuses`.
pub async fn wait_for_status(app: &Router, uri: &str, statuses: &[&str]) -> Value {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let response = get(app.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
            if statuses.contains(&status.as_str()) {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("status did not settle in time")
}
