//! HTTP front door for the execution core.
//!
//! Thin translation layer only: JSON in, `ToolRequest` down to the
//! coordinator, JSON out. Tool-level failures (non-zero exit, timeout) are
//! successful HTTP exchanges; only caller mistakes and launch failures map
//! to HTTP error codes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use armory_core::{Coordinator, ExecStatus, ExecuteError, ExecutionResult, ToolRequest};

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(run_tool))
        .route("/health", get(health))
        .route("/debug/status", get(debug_status))
        .route("/debug/history", get(debug_history))
        .route("/debug/tool-test", get(debug_tool_test))
        .layer(CorsLayer::permissive())
        .with_state(coordinator)
}

// --- API Types ---

#[derive(Serialize)]
struct RunResponse {
    request_id: u64,
    status: String,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    duration_ms: u64,
    truncated: bool,
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            request_id: result.request_id,
            status: result.status.label().to_string(),
            exit_code: result.status.exit_code(),
            stdout: result.stdout,
            stderr: result.stderr,
            duration_ms: result.duration_ms,
            truncated: result.truncated,
        }
    }
}

#[derive(Serialize)]
struct ToolParamInfo {
    name: &'static str,
    required: bool,
    default: Option<&'static str>,
}

#[derive(Serialize)]
struct ToolInfo {
    name: &'static str,
    binary: &'static str,
    description: &'static str,
    timeout_secs: u64,
    parameters: Vec<ToolParamInfo>,
}

#[derive(Deserialize)]
struct ToolTestQuery {
    tool: String,
}

// --- Handlers ---

async fn run_tool(
    State(coordinator): State<Arc<Coordinator>>,
    Path(name): Path<String>,
    body: Result<Json<HashMap<String, Value>>, JsonRejection>,
) -> Response {
    let raw = match body {
        Ok(Json(map)) => map,
        // No JSON body at all means an empty parameter set; a body that
        // fails to parse is reported as such, not as missing parameters.
        Err(JsonRejection::MissingJsonContentType(_)) => HashMap::new(),
        Err(rejection) => {
            return error_body(
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {rejection}"),
            )
        }
    };
    let mut params = HashMap::new();
    for (key, value) in raw {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            _ => {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    format!("parameter '{key}' must be a scalar value"),
                )
            }
        };
        params.insert(key, text);
    }

    match coordinator.execute(ToolRequest::new(&name, params)).await {
        Ok(result) => match &result.status {
            // The tool could not be started; nothing ran on the caller's behalf.
            ExecStatus::LaunchFailed(reason) => {
                error_body(StatusCode::INTERNAL_SERVER_ERROR, reason.clone())
            }
            _ => Json(RunResponse::from(result)).into_response(),
        },
        Err(err) => execute_error(err),
    }
}

async fn list_tools(State(coordinator): State<Arc<Coordinator>>) -> Json<Value> {
    let tools: Vec<ToolInfo> = coordinator
        .registry()
        .list()
        .into_iter()
        .map(|spec| ToolInfo {
            name: spec.name,
            binary: spec.binary,
            description: spec.description,
            timeout_secs: spec.timeout_secs,
            parameters: spec
                .params
                .iter()
                .map(|p| ToolParamInfo {
                    name: p.name,
                    required: p.required,
                    default: p.default,
                })
                .collect(),
        })
        .collect();
    Json(json!({ "count": tools.len(), "tools": tools }))
}

async fn health(State(coordinator): State<Arc<Coordinator>>) -> Json<Value> {
    let availability = coordinator.tool_availability();
    let all_available = availability.iter().all(|(_, ok)| *ok);
    let tools: HashMap<&str, &str> = availability
        .iter()
        .map(|(name, ok)| (*name, if *ok { "available" } else { "unavailable" }))
        .collect();

    Json(json!({
        "status": if all_available { "ok" } else { "degraded" },
        "tools": tools,
    }))
}

async fn debug_status(State(coordinator): State<Arc<Coordinator>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": coordinator.uptime().as_secs(),
        "request_count": coordinator.request_count(),
        "in_flight": coordinator.in_flight(),
        "max_concurrent": coordinator.max_concurrent(),
        "history_size": coordinator.history().len(),
    }))
}

async fn debug_history(State(coordinator): State<Arc<Coordinator>>) -> Json<Value> {
    let history = coordinator.history();
    Json(json!({ "count": history.len(), "history": history }))
}

async fn debug_tool_test(
    State(coordinator): State<Arc<Coordinator>>,
    Query(query): Query<ToolTestQuery>,
) -> Response {
    match coordinator.tool_test(&query.tool).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => execute_error(err),
    }
}

fn execute_error(err: ExecuteError) -> Response {
    match err {
        ExecuteError::NotFound(name) => {
            error_body(StatusCode::NOT_FOUND, format!("unknown tool: {name}"))
        }
        ExecuteError::Validation(e) => error_body(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
