//! HTTP surface for runcell
//!
//! Exposes `POST /execute`, `GET /health` and `GET /languages` on top of a
//! [`Runner`].

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use runcell::{ExecutionReport, ExecutionRequest, LanguageKind, RunStatus, Runner, ToolchainStatus};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::error::{ApiError, panic_response};

pub mod error;

/// Name reported by the health endpoint
pub const SERVER_NAME: &str = "runcell-server";

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Runner,

    /// Toolchain probe results gathered at startup
    pub toolchains: Arc<Vec<ToolchainStatus>>,
}

impl AppState {
    pub fn new(runner: Runner, toolchains: Vec<ToolchainStatus>) -> Self {
        Self {
            runner,
            toolchains: Arc::new(toolchains),
        }
    }
}

/// Body of a successful `POST /execute`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    /// False only when the program timed out
    pub success: bool,
    pub execution_id: String,
    pub language: String,
    pub output: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub runtime: String,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub timeout_ms: u64,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionReport> for ExecuteResponse {
    fn from(report: ExecutionReport) -> Self {
        let timeout_ms = report.timeout.as_millis() as u64;
        let error = report
            .timed_out()
            .then(|| format!("Execution timed out after {timeout_ms}ms"));
        Self {
            success: report.is_success(),
            execution_id: report.execution_id.to_string(),
            language: report.language,
            output: report.stdout,
            stderr: report.stderr,
            exit_code: report.exit_code,
            signal: report.signal,
            runtime: report.runtime,
            status: report.status,
            duration_ms: report.duration.as_millis() as u64,
            timeout_ms,
            truncated: report.truncated,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub languages: Vec<String>,
    pub server: &'static str,
    pub version: &'static str,
    pub toolchains: Vec<ToolchainStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorInfo {
    pub language: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub kind: LanguageKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagesResponse {
    pub supported: Vec<String>,
    pub count: usize,
    pub executors: Vec<ExecutorInfo>,
}

async fn execute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|rejection| ApiError::rejected(rejection, state.runner.supported_languages()))?;

    let language = request.language.clone();
    match state.runner.execute(request).await {
        Ok(report) => Ok(Json(ExecuteResponse::from(report))),
        Err(e) => Err(ApiError::from_execute(
            e,
            &language,
            state.runner.supported_languages(),
        )),
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        languages: state.runner.supported_languages(),
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        toolchains: state.toolchains.as_ref().clone(),
    })
}

async fn languages_handler(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let executors: Vec<ExecutorInfo> = state
        .runner
        .registry()
        .iter()
        .map(|(id, executor)| {
            let language = executor.language();
            ExecutorInfo {
                language: id.to_owned(),
                name: language.name.clone(),
                version: language.version.clone(),
                description: language.description.clone(),
                kind: language.kind,
            }
        })
        .collect();

    Json(LanguagesResponse {
        supported: state.runner.supported_languages(),
        count: executors.len(),
        executors,
    })
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.runner.config().max_body_bytes;

    let routes = Router::new()
        .route("/execute", post(execute_handler))
        .route("/health", get(health_handler))
        .route("/languages", get(languages_handler));
    with_middleware(routes, body_limit).with_state(state)
}

fn with_middleware<S>(router: Router<S>, body_limit: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` resolves, then wait for terminated processes
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let runner = state.runner.clone();
    let grace = runner.config().kill_grace() * 4;

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    if !runner.shutdown(grace).await {
        warn!("some terminated processes were still running at shutdown");
    }
    info!("server shut down gracefully");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
