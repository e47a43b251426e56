//! Request routing and the five JSON endpoints.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use orchestrator_core::{materialize, validate, InsertOutcome, TaskStatus, TaskStore};
use orchestrator_scheduler::Scheduler;
use tracing::debug;

use crate::dto::{ErrorBody, HealthBody, StatsBody, SubmitBody, TaskListBody};

pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, hyper::Error>;

/// Shared state handed to every connection's service closure.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub scheduler: Arc<Scheduler>,
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let bytes = match serde_json::to_vec(body) {
        Ok(b) => b,
        Err(_) => return json_response(StatusCode::INTERNAL_SERVER_ERROR, &ErrorBody::new("serialization failure")),
    };
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(
            Full::new(Bytes::from(bytes))
                .map_err(|never| match never {})
                .boxed_unsync(),
        )
        .expect("static response construction cannot fail")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(status, &ErrorBody::new(message))
}

/// Parse the first `key=value` pair matching `key` out of a raw query string.
/// No percent-decoding: task ids and status values are plain tokens in this API.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

pub async fn route(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let started_at = std::time::Instant::now();

    debug!(%method, %path, "handling request");

    let response = match (method.as_str(), path.as_str()) {
        ("POST", "/api/tasks") => submit_task(req, &state).await,
        ("GET", "/api/tasks") => list_tasks(&state, &query).await,
        ("GET", p) if p.starts_with("/api/tasks/") => {
            let id = &p["/api/tasks/".len()..];
            get_task(&state, id).await
        }
        ("GET", "/api/stats") => get_stats(&state).await,
        ("GET", "/api/health") => get_health(&state),
        _ => error_response(StatusCode::NOT_FOUND, "no such route"),
    };

    tracing::info!(
        target: "http_access",
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    Ok(response)
}

async fn submit_task(req: Request<hyper::body::Incoming>, state: &AppState) -> Response<BoxBody> {
    let body_bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "failed to read request body"),
    };

    let submission = match serde_json::from_slice(&body_bytes) {
        Ok(s) => s,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")),
    };

    let known = match state.store.list_all().await {
        Ok(tasks) => tasks,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if let Err(e) = validate(&submission, &known) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let task = materialize(&submission, &known);

    match state.store.insert(task).await {
        Ok(InsertOutcome::Inserted(task)) => {
            // One extra scheduling pass right away so a QUEUED submission
            // with a free slot doesn't wait for the next poll interval.
            state.scheduler.tick_soon();
            json_response(
                StatusCode::CREATED,
                &SubmitBody {
                    message: "task accepted",
                    task,
                },
            )
        }
        Ok(InsertOutcome::AlreadyExists) => {
            error_response(StatusCode::CONFLICT, "task id already exists")
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_task(state: &AppState, id: &str) -> Response<BoxBody> {
    match state.store.get(id).await {
        Ok(Some(task)) => json_response(StatusCode::OK, &task),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("task not found: {id}")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn list_tasks(state: &AppState, query: &str) -> Response<BoxBody> {
    let status_filter = query_param(query, "status");

    let tasks = match status_filter {
        None => state.store.list_all().await,
        Some(raw) => match TaskStatus::from_str(raw) {
            Some(status) => state.store.list_by_status(status).await,
            None => {
                return error_response(StatusCode::BAD_REQUEST, format!("unknown status: {raw}"));
            }
        },
    };

    match tasks {
        Ok(tasks) => json_response(StatusCode::OK, &TaskListBody::new(tasks)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_stats(state: &AppState) -> Response<BoxBody> {
    let store_stats = match state.store.stats().await {
        Ok(s) => s,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let body = StatsBody {
        store: store_stats,
        backend: state.store.backend_name(),
        max_concurrent_tasks: state.scheduler.max_concurrent(),
        slots_available: state.scheduler.slots_available().await,
        currently_running: state.scheduler.in_flight_ids().await,
    };

    json_response(StatusCode::OK, &body)
}

fn get_health(_state: &AppState) -> Response<BoxBody> {
    json_response(StatusCode::OK, &HealthBody::default())
}
