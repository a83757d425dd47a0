/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Subscription Module
//!
//! `Subscription` and `WebhookEndpoint` are owned by the Config Store,
//! not by durable storage: they live only as part of the current
//! validated configuration snapshot and are replaced wholesale on
//! every hot reload, keyed by `sub_id`. See the Config Store
//! component and the "Ownership" note in the data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::argvalue::FilterPredicate;

/// Filter map keyed by dotted argument path (e.g. `"args.from"`).
/// An empty map matches every event.
pub type FilterMap = BTreeMap<String, FilterPredicate>;

/// The four supported outbound payload shapes. See the Formatter Set
/// component for the exact shape each produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    /// Verbatim event structure, ISO-8601 timestamp.
    Generic,
    /// Single-level map, `arg_`-prefixed snake-cased keys.
    A,
    /// Nested `metadata` / `data`.
    B,
    /// Wrapped under `eventData` / `parameters`.
    C,
}

/// A single delivery target belonging to a `Subscription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub webhook_id: Uuid,
    pub url: Url,
    pub format: WebhookFormat,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds; must be > 0.
    pub timeout_ms: u64,
    /// Retry attempts allowed before dead-lettering; must be ≥ 0.
    pub retry_attempts: u32,
}

impl WebhookEndpoint {
    /// Validates the invariants named in the data model: URL carries a
    /// permitted scheme, timeout is positive.
    pub fn validate(&self) -> Result<(), String> {
        match self.url.scheme() {
            "http" | "https" => {}
            other => return Err(format!("webhook {}: unsupported scheme {other}", self.webhook_id)),
        }
        if self.timeout_ms == 0 {
            return Err(format!("webhook {}: timeout_ms must be > 0", self.webhook_id));
        }
        Ok(())
    }
}

/// A filter + endpoint(s) binding that selects which events become
/// deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub sub_id: Uuid,
    /// Contract addresses this subscription tails, lowercase `0x`-prefixed hex.
    pub contract_addresses: Vec<String>,
    /// Canonical event signatures, e.g. `Transfer(address,address,uint256)`.
    pub event_signatures: Vec<String>,
    #[serde(default)]
    pub filter: FilterMap,
    pub webhooks: Vec<WebhookEndpoint>,
}

impl Subscription {
    /// Validates the invariants named in the data model: at least one
    /// address, at least one parseable signature, at least one
    /// webhook, each webhook internally valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.contract_addresses.is_empty() {
            return Err(format!("subscription {}: no contract addresses", self.sub_id));
        }
        for addr in &self.contract_addresses {
            if !is_hex_address(addr) {
                return Err(format!("subscription {}: malformed address {addr}", self.sub_id));
            }
        }
        if self.event_signatures.is_empty() {
            return Err(format!("subscription {}: no event signatures", self.sub_id));
        }
        for sig in &self.event_signatures {
            if !is_event_signature(sig) {
                return Err(format!("subscription {}: malformed signature {sig}", self.sub_id));
            }
        }
        if self.webhooks.is_empty() {
            return Err(format!("subscription {}: at least one webhook is required", self.sub_id));
        }
        for endpoint in &self.webhooks {
            endpoint.validate()?;
        }
        Ok(())
    }
}

fn is_hex_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// `Name(type1,type2,...)`, loosely: a non-empty identifier followed
/// by a parenthesized, possibly empty, comma-separated type list.
fn is_event_signature(s: &str) -> bool {
    let Some(open) = s.find('(') else { return false };
    if !s.ends_with(')') {
        return false;
    }
    let name = &s[..open];
    if name.is_empty() || !name.chars().next().unwrap().is_alphabetic() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_endpoint() -> WebhookEndpoint {
        WebhookEndpoint {
            webhook_id: Uuid::new_v4(),
            url: Url::parse("https://example.com/hook").unwrap(),
            format: WebhookFormat::Generic,
            headers: BTreeMap::new(),
            timeout_ms: 5000,
            retry_attempts: 3,
        }
    }

    fn valid_subscription() -> Subscription {
        Subscription {
            sub_id: Uuid::new_v4(),
            contract_addresses: vec!["0x1234567890123456789012345678901234567890".to_string()],
            event_signatures: vec!["Transfer(address,address,uint256)".to_string()],
            filter: FilterMap::new(),
            webhooks: vec![valid_endpoint()],
        }
    }

    #[test]
    fn valid_subscription_passes() {
        assert!(valid_subscription().validate().is_ok());
    }

    #[test]
    fn subscription_without_webhooks_fails() {
        let mut sub = valid_subscription();
        sub.webhooks.clear();
        assert!(sub.validate().is_err());
    }

    #[test]
    fn malformed_address_fails() {
        let mut sub = valid_subscription();
        sub.contract_addresses = vec!["not-an-address".to_string()];
        assert!(sub.validate().is_err());
    }

    #[test]
    fn malformed_signature_fails() {
        let mut sub = valid_subscription();
        sub.event_signatures = vec!["Transfer".to_string()];
        assert!(sub.validate().is_err());
    }

    #[test]
    fn endpoint_zero_timeout_fails() {
        let mut endpoint = valid_endpoint();
        endpoint.timeout_ms = 0;
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn endpoint_rejects_non_http_scheme() {
        let mut endpoint = valid_endpoint();
        endpoint.url = Url::parse("ftp://example.com/hook").unwrap();
        assert!(endpoint.validate().is_err());
    }
}
