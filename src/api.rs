// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! HTTP surface of the name service.
//!
//! Routes: `POST /register`, `GET /resolve/:name`, `POST /transfer/:name`,
//! `GET /query?owner=`, `GET /status`, `POST /push-delta` (inbound for the
//! HTTP transport), plus `/metrics` and `/health`. Admission errors map to
//! 400, not-found to 404, stale to 409, rate-limited to 429, transport to
//! 503, everything unexpected to 500.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::config::{
    VnsConfig, DEFAULT_RECORD_TTL_SECS, LEASE_DAYS, POW_DIFFICULTY, RATE_LIMIT_MAX_ATTEMPTS, TLD,
};
use crate::core::security::admission::AdmissionError;
use crate::core::store::namespace::{
    MutationReceipt, NamespaceStore, ResolveOutcome, StoreError,
};
use crate::core::types::{Delta, Record, Registration};
use crate::monitoring::metrics::Metrics;
use crate::networking::transport::InboundTx;

/// Shared state behind the router.
pub struct ApiContext {
    /// The namespace store.
    pub store: Arc<NamespaceStore>,
    /// Inbound delta channel feeding the replicator.
    pub inbound_tx: InboundTx,
    /// Metrics registry for `/metrics`.
    pub metrics: Arc<Metrics>,
    /// Node configuration snapshot for `/status`.
    pub config: VnsConfig,
    /// Availability of the outbound transport (for the
    /// `queued_for_propagation` hint).
    pub availability: tokio::sync::watch::Receiver<bool>,
}

/// Error body: `{error, kind, detail?}`.
#[derive(Serialize)]
struct ErrorBody {
    error: bool,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

struct ApiError {
    status: StatusCode,
    kind: &'static str,
    detail: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str) -> Self {
        Self {
            status,
            kind,
            detail: None,
        }
    }

    fn with_detail(status: StatusCode, kind: &'static str, detail: String) -> Self {
        Self {
            status,
            kind,
            detail: Some(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: true,
            kind: self.kind.to_string(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

fn admission_status(e: &AdmissionError) -> (StatusCode, &'static str) {
    match e {
        AdmissionError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RateLimited"),
        AdmissionError::InvalidName(_) => (StatusCode::BAD_REQUEST, "InvalidName"),
        AdmissionError::TooManyRecords => (StatusCode::BAD_REQUEST, "TooManyRecords"),
        AdmissionError::LeaseOutOfRange => (StatusCode::BAD_REQUEST, "LeaseOutOfRange"),
        AdmissionError::Expired => (StatusCode::BAD_REQUEST, "Expired"),
        AdmissionError::BadProofOfWork => (StatusCode::BAD_REQUEST, "BadProofOfWork"),
        AdmissionError::BadSignature => (StatusCode::BAD_REQUEST, "BadSignature"),
        AdmissionError::MissingKey => (StatusCode::BAD_REQUEST, "MissingKey"),
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Admission(inner) => {
                let (status, kind) = admission_status(&inner);
                ApiError::with_detail(status, kind, inner.to_string())
            }
            StoreError::Reserved => ApiError::new(StatusCode::BAD_REQUEST, "Reserved"),
            StoreError::Stale => ApiError::new(StatusCode::CONFLICT, "Stale"),
            StoreError::NotFound => ApiError::new(StatusCode::NOT_FOUND, "NotFound"),
            StoreError::Expired => ApiError::new(StatusCode::NOT_FOUND, "Expired"),
            StoreError::MultiSigRequired => {
                ApiError::new(StatusCode::BAD_REQUEST, "MultiSigRequired")
            }
            StoreError::BlobIo(detail) => {
                ApiError::with_detail(StatusCode::INTERNAL_SERVER_ERROR, "BlobIO", detail)
            }
            StoreError::Corrupt(detail) => {
                ApiError::with_detail(StatusCode::INTERNAL_SERVER_ERROR, "Corrupt", detail)
            }
        }
    }
}

/// Build the router.
pub fn router(ctx: Arc<ApiContext>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/resolve/:name", get(resolve))
        .route("/transfer/:name", post(transfer))
        .route("/query", get(query))
        .route("/status", get(status))
        .route("/push-delta", post(push_delta))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(ctx)
}

fn caller_peer(addr: Option<&ConnectInfo<SocketAddr>>) -> String {
    addr.map(|ConnectInfo(a)| a.ip().to_string())
        .unwrap_or_else(|| "local".to_string())
}

#[derive(Serialize)]
struct MutationResponse {
    ok: bool,
    content_id: String,
    version: u64,
    queued_for_propagation: bool,
}

impl MutationResponse {
    fn new(receipt: MutationReceipt, available: bool) -> Self {
        Self {
            ok: true,
            content_id: receipt.content_id,
            version: receipt.version,
            queued_for_propagation: !available,
        }
    }
}

async fn register(
    State(ctx): State<Arc<ApiContext>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(reg): Json<Registration>,
) -> Result<Json<MutationResponse>, ApiError> {
    ensure_enabled(&ctx)?;
    let peer = caller_peer(addr.as_ref());
    let receipt = ctx.store.register(reg, &peer)?;
    Ok(Json(MutationResponse::new(
        receipt,
        *ctx.availability.borrow(),
    )))
}

#[derive(Serialize)]
struct ResolveResponse {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
}

async fn resolve(
    State(ctx): State<Arc<ApiContext>>,
    Path(name): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    match ctx.store.resolve(&name) {
        ResolveOutcome::Found {
            records,
            owner,
            expires_ms,
            ttl_hint,
        } => Ok(Json(ResolveResponse {
            found: true,
            records: Some(records),
            owner: Some(owner),
            expires: Some(expires_ms),
            ttl: Some(ttl_hint),
        })),
        ResolveOutcome::NotFound => Err(ApiError::new(StatusCode::NOT_FOUND, "NotFound")),
        ResolveOutcome::Expired => Err(ApiError::new(StatusCode::NOT_FOUND, "Expired")),
    }
}

#[derive(Deserialize)]
struct TransferRequest {
    new_owner: String,
    signature: String,
    /// Cross-checked against the incumbent before verification.
    current_owner: String,
    /// The signed tuple timestamp; must be within the skew tolerance.
    timestamp: u64,
}

async fn transfer(
    State(ctx): State<Arc<ApiContext>>,
    Path(name): Path<String>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    ensure_enabled(&ctx)?;
    // Refuse early when the claimed current owner is already out of date.
    match ctx.store.resolve(&name) {
        ResolveOutcome::Found { owner, .. } if owner != req.current_owner => {
            return Err(ApiError::new(StatusCode::CONFLICT, "Stale"));
        }
        _ => {}
    }
    let peer = caller_peer(addr.as_ref());
    let receipt = ctx.store.transfer(
        &name,
        &req.new_owner,
        &req.signature,
        req.timestamp,
        &peer,
    )?;
    Ok(Json(MutationResponse::new(
        receipt,
        *ctx.availability.borrow(),
    )))
}

#[derive(Deserialize)]
struct QueryParams {
    owner: String,
}

#[derive(Serialize)]
struct QueryResponse {
    names: Vec<String>,
}

async fn query(
    State(ctx): State<Arc<ApiContext>>,
    Query(params): Query<QueryParams>,
) -> Json<QueryResponse> {
    Json(QueryResponse {
        names: ctx.store.names_owned_by(&params.owner),
    })
}

#[derive(Serialize)]
struct StatusConfig {
    tld: &'static str,
    pow_difficulty: usize,
    rate_limit: usize,
    lease_days: u64,
    default_ttl: u32,
}

#[derive(Serialize)]
struct StatusResponse {
    enabled: bool,
    entries: usize,
    digest: String,
    degraded: bool,
    config: StatusConfig,
    build_timestamp: &'static str,
}

async fn status(State(ctx): State<Arc<ApiContext>>) -> Json<StatusResponse> {
    let store = ctx.store.status();
    Json(StatusResponse {
        enabled: ctx.config.enabled,
        entries: store.entries,
        digest: store.digest,
        degraded: store.degraded,
        config: StatusConfig {
            tld: TLD,
            pow_difficulty: POW_DIFFICULTY,
            rate_limit: RATE_LIMIT_MAX_ATTEMPTS,
            lease_days: LEASE_DAYS,
            default_ttl: DEFAULT_RECORD_TTL_SECS,
        },
        build_timestamp: env!("VERGEN_BUILD_TIMESTAMP"),
    })
}

#[derive(Serialize)]
struct PushResponse {
    accepted: bool,
}

async fn push_delta(
    State(ctx): State<Arc<ApiContext>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(delta): Json<Delta>,
) -> Result<Json<PushResponse>, ApiError> {
    ensure_enabled(&ctx)?;
    let peer = caller_peer(addr.as_ref());
    if ctx.inbound_tx.try_send((delta, peer)).is_err() {
        warn!("inbound delta channel full; push refused");
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "TransportUnavailable",
        ));
    }
    Ok(Json(PushResponse { accepted: true }))
}

async fn metrics(State(ctx): State<Arc<ApiContext>>) -> Response {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if encoder
        .encode(&ctx.metrics.registry.gather(), &mut buf)
        .is_err()
    {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    buf.into_response()
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn ensure_enabled(ctx: &ApiContext) -> Result<(), ApiError> {
    if ctx.config.enabled {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "TransportUnavailable",
        ))
    }
}
