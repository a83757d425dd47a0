/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # HTTP Sender
//!
//! Delivers a formatted payload to one [`WebhookEndpoint`] over HTTP
//! POST and reports back a uniform [`SendOutcome`] the Queue Processor
//! classifies into the retry/dead-letter decision. One [`reqwest::Client`]
//! is built once per process and shared across every send, relying on
//! its connection pooling rather than building a client per call.

use std::time::{Duration, Instant};

use relay_types::WebhookEndpoint;
use serde_json::Value as Json;
use tracing::{debug, warn};

/// Outcome of one delivery attempt, independent of what the caller
/// does with it.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    /// HTTP status code, when a response was received at all.
    pub status_code: Option<u16>,
    /// Human-readable failure description, present iff `!success`.
    pub error: Option<String>,
    pub response_time_ms: u64,
}

impl SendOutcome {
    /// Whether the failure is a transport-level one (timeout, connect
    /// refused, DNS) as opposed to a non-2xx HTTP response.
    pub fn is_transport_error(&self) -> bool {
        !self.success && self.status_code.is_none()
    }
}

/// Wraps one shared [`reqwest::Client`] used for every outbound
/// delivery in the process.
#[derive(Clone)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl Default for HttpSender {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// POSTs `payload` to `endpoint.url`, honoring `endpoint.timeout_ms`
    /// and merging `endpoint.headers` over the base
    /// `Content-Type: application/json`.
    pub async fn send(&self, endpoint: &WebhookEndpoint, payload: &Json) -> SendOutcome {
        let start = Instant::now();

        let mut request = self
            .client
            .post(endpoint.url.clone())
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .header("Content-Type", "application/json");

        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }

        let response = request.json(payload).send().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(webhook_id = %endpoint.webhook_id, %status, response_time_ms, "delivery succeeded");
                    SendOutcome {
                        success: true,
                        status_code: Some(status.as_u16()),
                        error: None,
                        response_time_ms,
                    }
                } else {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| String::from("<unreadable body>"));
                    let preview: String = body.chars().take(500).collect();
                    warn!(webhook_id = %endpoint.webhook_id, %status, "delivery received non-2xx response");
                    SendOutcome {
                        success: false,
                        status_code: Some(status.as_u16()),
                        error: Some(format!("HTTP {status}: {preview}")),
                        response_time_ms,
                    }
                }
            }
            Err(err) => {
                let classified = classify_error(&err);
                warn!(webhook_id = %endpoint.webhook_id, error = %classified, "delivery failed");
                SendOutcome {
                    success: false,
                    status_code: None,
                    error: Some(classified),
                    response_time_ms,
                }
            }
        }
    }
}

/// Classifies a transport-level `reqwest::Error` for logging and for
/// the caller's retry decision.
fn classify_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else if error.is_request() {
        format!("request error: {error}")
    } else {
        format!("transport error: {error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_has_no_status_code() {
        let outcome = SendOutcome {
            success: false,
            status_code: None,
            error: Some("connection refused".into()),
            response_time_ms: 3,
        };
        assert!(outcome.is_transport_error());
    }

    #[test]
    fn http_error_is_not_a_transport_error() {
        let outcome = SendOutcome {
            success: false,
            status_code: Some(500),
            error: Some("HTTP 500".into()),
            response_time_ms: 12,
        };
        assert!(!outcome.is_transport_error());
    }

    #[test]
    fn successful_outcome_has_status_and_no_error() {
        let outcome = SendOutcome {
            success: true,
            status_code: Some(200),
            error: None,
            response_time_ms: 40,
        };
        assert!(!outcome.is_transport_error());
        assert!(outcome.error.is_none());
    }
}
