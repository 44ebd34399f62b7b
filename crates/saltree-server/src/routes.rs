//! HTTP routes for the retrieval server

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use saltree_core::ot::{RecordDisclosure, SenderResponse};
use saltree_core::pir::QueryResponse;
use saltree_core::Commitment;

use crate::error::{Result, ServerError};
use crate::metrics;
use crate::state::{SharedState, TreeStats};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub tree: TreeStats,
}

/// Append request
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertRequest {
    /// Record bytes, hex encoded
    #[serde(with = "saltree_core::encoding::hex_bytes")]
    pub record: Vec<u8>,
}

/// Append response
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResponse {
    pub index: u64,
    pub commitment: Commitment,
}

/// Tombstone response
#[derive(Debug, Serialize, Deserialize)]
pub struct TombstoneResponse {
    pub index: u64,
    pub commitment: Commitment,
}

/// Snapshot response
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub path: String,
    pub commitment: Commitment,
}

fn observe<T>(route: &str, start: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => metrics::OUTCOME_OK,
        Err(e) => e.outcome(),
    };
    metrics::record_request(route, outcome, start.elapsed());
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready".to_string(),
        tree: state.stats().await,
    })
}

async fn root(State(state): State<SharedState>) -> Json<Commitment> {
    let start = Instant::now();
    let commitment = state.commitment();
    metrics::record_request(metrics::ROUTE_ROOT, metrics::OUTCOME_OK, start.elapsed());
    Json(commitment)
}

async fn ot_response(
    State(state): State<SharedState>,
    Path(index): Path<u64>,
) -> Result<Json<SenderResponse>> {
    let start = Instant::now();
    let result = state.sender_response(index).await;
    observe(metrics::ROUTE_OT, start, &result);
    result.map(Json)
}

async fn ot_record(
    State(state): State<SharedState>,
    Path(index): Path<u64>,
) -> Result<Json<RecordDisclosure>> {
    let start = Instant::now();
    let result = state.record_disclosure(index).await;
    observe(metrics::ROUTE_OT_RECORD, start, &result);
    result.map(Json)
}

async fn pir_query(
    State(state): State<SharedState>,
    Path(index): Path<u64>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    let result = state.query(index).await;
    observe(metrics::ROUTE_PIR, start, &result);
    result.map(Json)
}

async fn insert(
    State(state): State<SharedState>,
    Json(req): Json<InsertRequest>,
) -> Result<(StatusCode, Json<InsertResponse>)> {
    let start = Instant::now();
    let result = state.insert(req.record).await;
    observe(metrics::ROUTE_INSERT, start, &result);
    let (index, commitment) = result?;
    Ok((StatusCode::CREATED, Json(InsertResponse { index, commitment })))
}

async fn tombstone(
    State(state): State<SharedState>,
    Path(index): Path<u64>,
) -> Result<Json<TombstoneResponse>> {
    let start = Instant::now();
    let result = state.tombstone(index).await;
    observe(metrics::ROUTE_TOMBSTONE, start, &result);
    Ok(Json(TombstoneResponse {
        index,
        commitment: result?,
    }))
}

async fn snapshot(State(state): State<SharedState>) -> Result<Json<SnapshotResponse>> {
    let start = Instant::now();
    let result = state.save_snapshot().await;
    observe(metrics::ROUTE_SNAPSHOT, start, &result);
    Ok(Json(SnapshotResponse {
        path: result?.display().to_string(),
        commitment: state.commitment(),
    }))
}

async fn metrics_text(State(state): State<SharedState>) -> Response {
    match state.metrics_handle() {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ServerError::Internal("metrics recorder not installed".into()).into_response(),
    }
}

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/root", get(root))
        .route("/ot/:index", get(ot_response))
        .route("/ot/:index/record", get(ot_record))
        .route("/pir/:index", get(pir_query))
        .route("/records", post(insert))
        .route("/records/:index", delete(tombstone))
        .route("/admin/snapshot", post(snapshot))
        .route("/metrics", get(metrics_text))
        .with_state(state)
}
