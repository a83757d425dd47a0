/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{admin, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        health::readyz,
        admin::metrics_handler,
        admin::retry_dead_letter,
        admin::purge_dead_letter,
    ),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "admin", description = "Metrics exposition and dead-letter administration")
    )
)]
pub struct ApiDoc;

/// Serves the generated OpenAPI document and the Swagger UI, state-agnostic
/// so it can be merged into any router before `.with_state(...)`.
pub fn configure_openapi<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/docs/openapi.json", get(serve_openapi))
        .merge(SwaggerUi::new("/swagger-ui"))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
