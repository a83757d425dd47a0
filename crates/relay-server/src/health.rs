/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Liveness/readiness endpoints. Readiness reflects chain connectivity
//! and database reachability rather than any upstream API dependency.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use relay_chain::{ChainStatus, ChainStatusHandle};
use relay_queue::ConnectionPool;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct HealthState {
    pub chain_status: ChainStatusHandle,
    pub db_pool: ConnectionPool,
}

#[derive(Serialize, ToSchema)]
struct ReadyResponse {
    status: &'static str,
    chain: &'static str,
    database: &'static str,
}

pub fn routes() -> Router<HealthState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

/// Liveness: the process is running and able to respond.
#[utoipa::path(get, path = "/healthz", responses((status = 200, description = "Process is alive")), tag = "health")]
pub(crate) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness: `ready` when the chain is connected and the database is
/// reachable, `degraded` when the chain is reconnecting but the
/// database still answers, `unhealthy` when the database does not.
#[utoipa::path(
    get,
    path = "/readyz",
    responses(
        (status = 200, description = "ready or degraded", body = ReadyResponse),
        (status = 503, description = "unhealthy", body = ReadyResponse)
    ),
    tag = "health"
)]
pub(crate) async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    let db_ok = state.db_pool.get().is_ok();
    let chain_connected = state.chain_status.get() == ChainStatus::Connected;

    if !db_ok {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse { status: "unhealthy", chain: status_label(chain_connected), database: "unreachable" }),
        );
    }

    let status = if chain_connected { "ready" } else { "degraded" };
    (
        StatusCode::OK,
        Json(ReadyResponse { status, chain: status_label(chain_connected), database: "reachable" }),
    )
}

fn status_label(connected: bool) -> &'static str {
    if connected { "connected" } else { "degraded" }
}
