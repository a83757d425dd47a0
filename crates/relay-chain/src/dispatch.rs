/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Pure matching of a decoded event against the current subscription
//! set: address, event name, then the subscription's filter map.

use relay_types::{BlockchainEvent, Subscription};
use uuid::Uuid;

/// Returns the `sub_id` of every subscription `event` matches: its
/// contract address is in `contract_addresses` (case-insensitively),
/// its event name was declared by one of `event_signatures`, and its
/// filter map (if any) matches.
pub fn matched_subscriptions(event: &BlockchainEvent, subscriptions: &[Subscription]) -> Vec<Uuid> {
    subscriptions
        .iter()
        .filter(|sub| matches_address(sub, &event.contract_address))
        .filter(|sub| matches_event_name(sub, &event.event_name))
        .filter(|sub| relay_filter::matches(event, &sub.filter))
        .map(|sub| sub.sub_id)
        .collect()
}

fn matches_address(sub: &Subscription, contract_address: &str) -> bool {
    sub.contract_addresses
        .iter()
        .any(|addr| addr.eq_ignore_ascii_case(contract_address))
}

fn matches_event_name(sub: &Subscription, event_name: &str) -> bool {
    sub.event_signatures
        .iter()
        .any(|sig| sig.split('(').next() == Some(event_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_types::{ArgMap, FilterMap, WebhookEndpoint, WebhookFormat};
    use url::Url;

    fn sample_subscription() -> Subscription {
        Subscription {
            sub_id: Uuid::new_v4(),
            contract_addresses: vec!["0x1234567890123456789012345678901234567890".to_string()],
            event_signatures: vec!["Transfer(address,address,uint256)".to_string()],
            filter: FilterMap::new(),
            webhooks: vec![WebhookEndpoint {
                webhook_id: Uuid::new_v4(),
                url: Url::parse("https://example.com/hook").unwrap(),
                format: WebhookFormat::Generic,
                headers: Default::default(),
                timeout_ms: 5000,
                retry_attempts: 3,
            }],
        }
    }

    fn sample_event() -> BlockchainEvent {
        BlockchainEvent {
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
            event_name: "Transfer".to_string(),
            block_number: 1,
            tx_hash: "0xabc".to_string(),
            log_index: 0,
            args: ArgMap::new(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn matches_on_address_and_event_name() {
        let sub = sample_subscription();
        let event = sample_event();
        assert_eq!(matched_subscriptions(&event, &[sub.clone()]), vec![sub.sub_id]);
    }

    #[test]
    fn address_match_is_case_insensitive() {
        let sub = sample_subscription();
        let mut event = sample_event();
        event.contract_address = event.contract_address.to_uppercase();
        assert_eq!(matched_subscriptions(&event, &[sub.clone()]), vec![sub.sub_id]);
    }

    #[test]
    fn no_match_for_unrelated_address() {
        let sub = sample_subscription();
        let mut event = sample_event();
        event.contract_address = "0x0000000000000000000000000000000000dead".to_string();
        assert!(matched_subscriptions(&event, &[sub]).is_empty());
    }

    #[test]
    fn no_match_for_unrelated_event_name() {
        let sub = sample_subscription();
        let mut event = sample_event();
        event.event_name = "Approval".to_string();
        assert!(matched_subscriptions(&event, &[sub]).is_empty());
    }
}
