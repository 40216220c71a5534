//! HTTP transport for hooks
//!
//! | route                                   | auth | response                     |
//! |-----------------------------------------|------|------------------------------|
//! | `GET /ping`                             | no   | `{"version": ...}`           |
//! | `GET /hooks`                            | yes  | `{"hooks": [...]}`           |
//! | `POST /hooks/:id/:action`               | yes  | `{"id": run_id}`             |
//! | `GET /hooks/:id/:action/:run_id`        | yes  | `{"run": {id, completed, exit_code}}` |
//! | `GET /hooks/:id/:action/:run_id/log`    | yes  | redacted log, `text/plain`   |
//!
//! Authenticated routes compare the `Auth-Token` header with the configured
//! token in constant time. Hooks are re-read from the config directory on every request.

use crate::engine::HookEngine;
use crate::error::EngineError;
use crate::hooks::HookSource;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const AUTH_TOKEN_HEADER: &str = "Auth-Token";

#[derive(Clone)]
pub struct HookServer {
    engine: HookEngine,
    source: HookSource,
    token: Arc<str>,
}

impl HookServer {
    pub fn new(engine: HookEngine, source: HookSource, token: &str) -> Self {
        Self {
            engine,
            source,
            token: Arc::from(token.trim()),
        }
    }

    pub fn engine(&self) -> &HookEngine {
        &self.engine
    }

    pub fn router(&self) -> Router {
        let authorized = Router::new()
            .route("/hooks", get(list_hooks))
            .route("/hooks/:id/:action", post(start_run))
            .route("/hooks/:id/:action/:run_id", get(run_status))
            .route("/hooks/:id/:action/:run_id/log", get(run_log))
            .route_layer(middleware::from_fn_with_state(self.clone(), require_token));

        Router::new()
            .route("/ping", get(ping))
            .merge(authorized)
            .with_state(self.clone())
    }

    /// Serve until Ctrl-C
    pub async fn start(&self, listen_addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("Failed to bind {listen_addr}"))?;
        tracing::info!(
            "Serving hooks from {} on http://{}",
            self.source.root().display(),
            listener.local_addr()?
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn require_token(State(server): State<HookServer>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| {
            !server.token.is_empty() && bool::from(token.as_bytes().ct_eq(server.token.as_bytes()))
        });

    if !authorized {
        tracing::debug!("Rejected unauthenticated request to {}", request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "unauthorized" })),
        )
            .into_response();
    }
    next.run(request).await
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            EngineError::RunNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "version": crate::VERSION }))
}

async fn list_hooks(State(server): State<HookServer>) -> Result<Json<Value>, ApiError> {
    let hooks = server.source.list()?;
    Ok(Json(json!({ "hooks": hooks })))
}

async fn start_run(
    State(server): State<HookServer>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let hook = Arc::new(server.source.load(&id, &action)?);
    let run = server.engine.spawn(hook);
    tracing::info!(run = run.id(), "Started {}/{}", id, action);
    Ok(Json(json!({ "id": run.id() })))
}

async fn run_status(
    State(server): State<HookServer>,
    Path((id, action, run_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let hook = server.source.load(&id, &action)?;
    let run = server.engine.get_run(&hook, &run_id)?;
    Ok(Json(json!({ "run": run.snapshot() })))
}

async fn run_log(
    State(server): State<HookServer>,
    Path((id, action, run_id)): Path<(String, String, String)>,
) -> Result<String, ApiError> {
    let hook = server.source.load(&id, &action)?;
    let run = server.engine.get_run(&hook, &run_id)?;
    Ok(run.log())
}
