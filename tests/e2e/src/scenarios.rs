/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! End-to-end scenarios against a running relay-server.
//!
//! These exercise only the externally observable operational surface
//! (health, metrics exposition, and the dead-letter admin routes).
//! They assume a relay-server process with its own chain RPC and
//! database already wired up; they do not seed chain events or
//! deliveries themselves.

use crate::api::Client;
use uuid::Uuid;

pub async fn test_health(client: &Client) -> crate::api::Result<()> {
    let (status, body) = client.healthz().await?;
    if !status.is_success() {
        return Err(format!("healthz returned {status}").into());
    }
    if body.is_empty() {
        return Err("healthz returned an empty body".into());
    }

    let (status, body) = client.readyz().await?;
    let reported = body
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or("readyz response missing status field")?;
    match reported {
        "ready" | "degraded" => {
            if status != reqwest::StatusCode::OK {
                return Err(format!("{reported} reported but HTTP status was {status}").into());
            }
        }
        "unhealthy" => {
            if status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(format!("unhealthy reported but HTTP status was {status}").into());
            }
        }
        other => return Err(format!("unexpected readiness status {other}").into()),
    }
    Ok(())
}

pub async fn test_metrics(client: &Client) -> crate::api::Result<()> {
    let text = client.metrics().await?;

    // Prometheus text exposition: HELP/TYPE headers precede each family.
    for family in [
        "events_processed_total",
        "webhook_deliveries_total",
        "webhook_response_time_ms",
        "queue_size",
        "dlq_entries_total",
    ] {
        if !text.contains(&format!("# TYPE {family}")) {
            return Err(format!("metrics exposition missing TYPE line for {family}").into());
        }
    }
    Ok(())
}

pub async fn test_dlq_admin(client: &Client) -> crate::api::Result<()> {
    let missing = Uuid::new_v4();

    let status = client.dlq_retry(missing).await?;
    if status != reqwest::StatusCode::NOT_FOUND {
        return Err(format!("retry of unknown dead-letter entry returned {status}, expected 404").into());
    }

    let status = client.dlq_purge(missing).await?;
    if status != reqwest::StatusCode::NOT_FOUND {
        return Err(format!("purge of unknown dead-letter entry returned {status}, expected 404").into());
    }

    Ok(())
}
