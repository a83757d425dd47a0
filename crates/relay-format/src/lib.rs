/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Formatter Set
//!
//! Four payload shapes, selected purely on [`WebhookFormat`]: the
//! *generic* shape preserves the event structure verbatim, and three
//! automation-platform variants (A/B/C) reshape the same data for
//! tools that expect a flattened, nested, or wrapped body. Formatter
//! selection never suspends and never fails for a well-formed event —
//! logic bugs here are the only way to produce a `FormatterError`, and
//! are fatal to the single delivery, not the pipeline.

use relay_types::{ArgValue, BlockchainEvent, WebhookFormat};
use serde_json::{Map, Value};

/// Formats `event` into the JSON body appropriate for `format`. The
/// result is exactly the request body the HTTP Sender will POST.
pub fn format(event: &BlockchainEvent, format: WebhookFormat) -> Value {
    match format {
        WebhookFormat::Generic => format_generic(event),
        WebhookFormat::A => format_a(event),
        WebhookFormat::B => format_b(event),
        WebhookFormat::C => format_c(event),
    }
}

fn args_to_json_map(event: &BlockchainEvent) -> Map<String, Value> {
    event
        .args
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// Verbatim event structure, ISO-8601 UTC timestamp.
fn format_generic(event: &BlockchainEvent) -> Value {
    serde_json::json!({
        "contractAddress": event.contract_address,
        "eventName": event.event_name,
        "blockNumber": event.block_number,
        "txHash": event.tx_hash,
        "logIndex": event.log_index,
        "args": Value::Object(args_to_json_map(event)),
        "observedAt": event.observed_at.to_rfc3339(),
    })
}

/// Single-level map. Event metadata fields stay snake_case;
/// arguments get an `arg_` prefix. Nested objects (none occur in a
/// decoded argument map today, but the rule is general) are
/// dot-flattened; arrays and date values are left intact.
fn format_a(event: &BlockchainEvent) -> Value {
    let mut out = Map::new();
    out.insert("contract_address".to_string(), Value::String(event.contract_address.clone()));
    out.insert("event_name".to_string(), Value::String(event.event_name.clone()));
    out.insert("block_number".to_string(), Value::Number(event.block_number.into()));
    out.insert("tx_hash".to_string(), Value::String(event.tx_hash.clone()));
    out.insert("log_index".to_string(), Value::Number(event.log_index.into()));
    out.insert("observed_at".to_string(), Value::String(event.observed_at.to_rfc3339()));

    for (key, value) in &event.args {
        flatten_into(&mut out, &format!("arg_{}", to_snake_case(key)), &value.to_json());
    }
    Value::Object(out)
}

/// `metadata` carries chain/tx facts, `data` carries decoded args.
fn format_b(event: &BlockchainEvent) -> Value {
    serde_json::json!({
        "metadata": {
            "contractAddress": event.contract_address,
            "eventName": event.event_name,
            "blockNumber": event.block_number,
            "txHash": event.tx_hash,
            "logIndex": event.log_index,
            "observedAt": event.observed_at.to_rfc3339(),
        },
        "data": Value::Object(args_to_json_map(event)),
    })
}

/// Everything wrapped under `eventData`, arguments under `parameters`.
fn format_c(event: &BlockchainEvent) -> Value {
    serde_json::json!({
        "eventData": {
            "contractAddress": event.contract_address,
            "eventName": event.event_name,
            "blockNumber": event.block_number,
            "txHash": event.tx_hash,
            "logIndex": event.log_index,
            "observedAt": event.observed_at.to_rfc3339(),
            "parameters": Value::Object(args_to_json_map(event)),
        }
    })
}

/// Dot-flattens a JSON object into `out` under `prefix`; arrays and
/// scalars are inserted as-is without further descent.
fn flatten_into(out: &mut Map<String, Value>, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(out, &format!("{prefix}.{}", to_snake_case(k)), v);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_event() -> BlockchainEvent {
        let mut args = relay_types::argvalue::ArgMap::new();
        args.insert("from".to_string(), ArgValue::Address("0xaaaa".to_string()));
        args.insert("tokenId".to_string(), ArgValue::BigInt("7".to_string()));
        BlockchainEvent {
            contract_address: "0x1234".to_string(),
            event_name: "Transfer".to_string(),
            block_number: 100,
            tx_hash: "0xdead".to_string(),
            log_index: 2,
            args,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn generic_preserves_structure_with_args_nested() {
        let out = format_generic(&sample_event());
        assert_eq!(out["eventName"], "Transfer");
        assert_eq!(out["args"]["from"], "0xaaaa");
    }

    #[test]
    fn variant_a_flattens_with_arg_prefix_and_snake_case() {
        let out = format_a(&sample_event());
        assert_eq!(out["arg_from"], "0xaaaa");
        assert_eq!(out["arg_token_id"], "7");
        assert_eq!(out["contract_address"], "0x1234");
    }

    #[test]
    fn variant_b_nests_metadata_and_data() {
        let out = format_b(&sample_event());
        assert_eq!(out["metadata"]["eventName"], "Transfer");
        assert_eq!(out["data"]["from"], "0xaaaa");
    }

    #[test]
    fn variant_c_wraps_under_event_data_with_parameters() {
        let out = format_c(&sample_event());
        assert_eq!(out["eventData"]["eventName"], "Transfer");
        assert_eq!(out["eventData"]["parameters"]["from"], "0xaaaa");
    }

    #[test]
    fn format_dispatch_selects_by_enum() {
        let event = sample_event();
        let a = format(&event, WebhookFormat::A);
        assert!(a.get("arg_from").is_some());
        let generic = format(&event, WebhookFormat::Generic);
        assert!(generic.get("args").is_some());
    }

    #[test]
    fn snake_case_handles_consecutive_and_leading_capitals() {
        assert_eq!(to_snake_case("tokenId"), "token_id");
        assert_eq!(to_snake_case("from"), "from");
        assert_eq!(to_snake_case("URL"), "u_r_l");
    }
}
