//! HTTP backend for the inaccuracy analysis engine.
//!
//! Exposes record ingest, the calculate pass, and the read-side analyses
//! (yearly series, correlations, matrix, raw ledger download) over JSON.
//! Failures carry a `detail` body; a missing or empty ledger maps to 404.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;

use inaccuracy_core::{
    EngineError, Ledger, MeasurementRecord, MemoryStore, YearlySeries, build_matrix,
    compute_correlations,
};

/// Shared server state. Store and ledger carry their own synchronization.
pub struct AppState {
    pub store: MemoryStore,
    pub ledger: Ledger,
    /// Records file the store is written back to after mutations. Without it
    /// processed flags live only in memory, and a restart would re-append
    /// every record's errors to the ledger.
    pub records_path: Option<PathBuf>,
}

/// Write the store back to the records file, keeping processed flags, so a
/// restarted server does not treat already-ledgered records as new.
fn persist_store(state: &AppState) -> Result<(), EngineError> {
    let Some(ref path) = state.records_path else {
        return Ok(());
    };
    let json =
        serde_json::to_string_pretty(&state.store.records()).map_err(std::io::Error::other)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Calculate pass: append errors for new records, then persist the flipped
/// processed flags.
fn run_calculate(state: &AppState) -> Result<usize, EngineError> {
    let added = state.ledger.write_new_errors(&state.store)?;
    if added > 0 {
        persist_store(state)?;
    }
    Ok(added)
}

#[derive(Serialize)]
struct CreatedResponse {
    id: u64,
}

#[derive(Serialize)]
struct CalculateResponse {
    added: usize,
    message: String,
}

#[derive(Serialize)]
struct ErrorsResponse {
    yearly_data: YearlySeries,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    records_total: usize,
    ledger_exists: bool,
}

fn engine_error_response(err: EngineError) -> (StatusCode, Json<serde_json::Value>) {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        log::error!("request failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(serde_json::json!({ "detail": err.to_string() })))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Inaccuracy Analysis Server",
        "version": inaccuracy_core::VERSION,
        "records": state.store.len(),
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/records": {
                "method": "POST",
                "description": "Ingest one measurement record (JSON body)",
            },
            "/inaccuracy/calculate": {
                "method": "POST",
                "description": "Compute errors for new records and append them to the ledger",
            },
            "/inaccuracy/errors": "Per-year normalized error series",
            "/inaccuracy/correlations": "Pearson statistics and category means per condition",
            "/inaccuracy/matrix": "Condition-by-covariate correlation matrix with root causes",
            "/inaccuracy/download": "Raw ledger file",
        },
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        records_total: state.store.len(),
        ledger_exists: state.ledger.exists(),
    })
}

async fn handle_create_record(
    State(state): State<Arc<AppState>>,
    Json(record): Json<MeasurementRecord>,
) -> Response {
    let id = state.store.insert(record);
    log::debug!("ingested record {id}");
    if let Err(err) = persist_store(&state) {
        return engine_error_response(err).into_response();
    }
    (StatusCode::CREATED, Json(CreatedResponse { id })).into_response()
}

async fn handle_calculate(State(state): State<Arc<AppState>>) -> Response {
    match run_calculate(&state) {
        Ok(0) => Json(CalculateResponse {
            added: 0,
            message: "no new data".to_string(),
        })
        .into_response(),
        Ok(added) => Json(CalculateResponse {
            added,
            message: format!("{added} new records added"),
        })
        .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

async fn handle_errors(State(state): State<Arc<AppState>>) -> Response {
    match state.ledger.read_yearly_series() {
        Ok(yearly_data) => Json(ErrorsResponse { yearly_data }).into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

async fn handle_correlations(State(state): State<Arc<AppState>>) -> Response {
    match compute_correlations(&state.ledger, &state.store) {
        Ok(correlations) => {
            Json(serde_json::json!({ "correlations": correlations })).into_response()
        }
        Err(err) => engine_error_response(err).into_response(),
    }
}

async fn handle_matrix(State(state): State<Arc<AppState>>) -> Response {
    match build_matrix(&state.ledger, &state.store) {
        Ok(matrix) => Json(matrix).into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

async fn handle_download(State(state): State<Arc<AppState>>) -> Response {
    match state.ledger.raw_contents() {
        Ok(contents) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"inaccuracytest.txt\"",
                ),
            ],
            contents,
        )
            .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

/// Build the axum router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/records", post(handle_create_record))
        .route("/inaccuracy/calculate", post(handle_calculate))
        .route("/inaccuracy/errors", get(handle_errors))
        .route("/inaccuracy/correlations", get(handle_correlations))
        .route("/inaccuracy/matrix", get(handle_matrix))
        .route("/inaccuracy/download", get(handle_download))
        .with_state(state)
}

/// Run the HTTP server until the process exits.
pub async fn run_server(
    store: MemoryStore,
    ledger: Ledger,
    records_path: Option<PathBuf>,
    host: &str,
    port: u16,
) {
    let state = Arc::new(AppState {
        store,
        ledger,
        records_path,
    });
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    log::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
