/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Prometheus exposition and the dead-letter admin surface.
//!
//! Neither admin route is authenticated: the configuration contract
//! names no auth scheme for them, so the operator is expected to keep
//! this surface behind a network boundary, the same assumption the
//! health endpoints make.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use relay_deadletter::DeadLetterDAL;
use relay_queue::DeliveriesDAL;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone)]
pub struct AdminState {
    pub deliveries: Arc<DeliveriesDAL>,
    pub dead_letters: Arc<DeadLetterDAL>,
}

#[derive(Serialize, ToSchema)]
struct RetryResponse {
    delivery_id: Uuid,
    requeued: bool,
}

pub fn routes() -> Router<AdminState> {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/dlq/:id/retry", post(retry_dead_letter))
        .route("/dlq/:id", delete(purge_dead_letter))
}

/// Prometheus text exposition of the process-wide registry.
#[utoipa::path(get, path = "/metrics", responses((status = 200, description = "Prometheus exposition")), tag = "admin")]
pub(crate) async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        relay_metrics::encode_metrics(),
    )
}

/// Replays a dead-lettered delivery back onto the queue with a fresh
/// attempt budget.
#[utoipa::path(
    post,
    path = "/dlq/{id}/retry",
    params(("id" = Uuid, Path, description = "Dead-letter entry id")),
    responses(
        (status = 200, description = "Requeued", body = RetryResponse),
        (status = 404, description = "No such dead-letter entry"),
        (status = 500, description = "Storage error")
    ),
    tag = "admin"
)]
pub(crate) async fn retry_dead_letter(State(state): State<AdminState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.dead_letters.retry(id) {
        Ok(Some(delivery)) => match state.deliveries.enqueue(&delivery) {
            Ok(()) => (StatusCode::OK, Json(RetryResponse { delivery_id: id, requeued: true })).into_response(),
            Err(e) => {
                error!(delivery_id = %id, error = %e, "failed to re-enqueue retried dead-letter entry");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(delivery_id = %id, error = %e, "failed to retry dead-letter entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Purges a dead-lettered entry without replaying it.
#[utoipa::path(
    delete,
    path = "/dlq/{id}",
    params(("id" = Uuid, Path, description = "Dead-letter entry id")),
    responses(
        (status = 204, description = "Purged"),
        (status = 404, description = "No such dead-letter entry"),
        (status = 500, description = "Storage error")
    ),
    tag = "admin"
)]
pub(crate) async fn purge_dead_letter(State(state): State<AdminState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.dead_letters.remove(id) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(relay_deadletter::DlqError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(delivery_id = %id, error = %e, "failed to purge dead-letter entry");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
