/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! HTTP client for the relay's health/metrics/admin surface.

#![allow(dead_code)]

use std::time::Duration;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.to_string() }
    }

    /// Wait for the process to answer liveness checks.
    pub async fn wait_for_ready(&self, timeout_secs: u64) -> Result<()> {
        let start = std::time::Instant::now();
        loop {
            match self.http.get(&format!("{}/healthz", self.base_url)).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => {
                    if start.elapsed() > Duration::from_secs(timeout_secs) {
                        return Err("timeout waiting for relay-server".into());
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub async fn healthz(&self) -> Result<(reqwest::StatusCode, String)> {
        let resp = self.http.get(&format!("{}/healthz", self.base_url)).send().await?;
        let status = resp.status();
        Ok((status, resp.text().await?))
    }

    pub async fn readyz(&self) -> Result<(reqwest::StatusCode, serde_json::Value)> {
        let resp = self.http.get(&format!("{}/readyz", self.base_url)).send().await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }

    pub async fn metrics(&self) -> Result<String> {
        let resp = self.http.get(&format!("{}/metrics", self.base_url)).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(format!("HTTP {status}: {text}").into());
        }
        Ok(text)
    }

    /// `POST /dlq/{id}/retry`. Returns the raw status since the only
    /// externally observable case without a seeded dead-letter entry
    /// is the 404 branch.
    pub async fn dlq_retry(&self, id: Uuid) -> Result<reqwest::StatusCode> {
        let resp = self.http.post(&format!("{}/dlq/{}/retry", self.base_url, id)).send().await?;
        Ok(resp.status())
    }

    /// `DELETE /dlq/{id}`.
    pub async fn dlq_purge(&self, id: Uuid) -> Result<reqwest::StatusCode> {
        let resp = self.http.delete(&format!("{}/dlq/{}", self.base_url, id)).send().await?;
        Ok(resp.status())
    }
}
