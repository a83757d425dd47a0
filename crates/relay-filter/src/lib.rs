/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Filter Engine
//!
//! Pure predicate evaluation of a subscription's filter map against a
//! matched event's decoded arguments. No suspension points permitted
//! here — every call is synchronous and allocation-only.

use num_bigint::BigInt;
use relay_types::{ArgValue, BlockchainEvent, FilterPredicate};

/// Evaluates every predicate in `filter` against `event`. An empty
/// filter map matches everything. All predicates must match (logical
/// AND) for the subscription to match the event.
pub fn matches(event: &BlockchainEvent, filter: &relay_types::FilterMap) -> bool {
    filter
        .iter()
        .all(|(path, predicate)| evaluate(event, path, predicate))
}

fn evaluate(event: &BlockchainEvent, path: &str, predicate: &FilterPredicate) -> bool {
    let Some(value) = resolve(event, path) else {
        return false;
    };
    match predicate {
        FilterPredicate::Eq { value: expected } => values_equal(value, expected),
        FilterPredicate::Ne { value: expected } => !values_equal(value, expected),
        FilterPredicate::Gt { value: expected } => numeric_cmp(value, expected) == Some(std::cmp::Ordering::Greater),
        FilterPredicate::Lt { value: expected } => numeric_cmp(value, expected) == Some(std::cmp::Ordering::Less),
        FilterPredicate::In { values } => values.iter().any(|v| values_equal(value, v)),
        FilterPredicate::Contains { value: expected } => contains(value, expected),
    }
}

/// Resolves a dotted path (e.g. `"args.from"`) against an event's
/// flat argument map. The `args.` prefix is optional and stripped if
/// present; the remaining path names a single argument since the
/// decoded argument map has no further nesting beyond arrays.
fn resolve<'a>(event: &'a BlockchainEvent, path: &str) -> Option<&'a ArgValue> {
    let stripped = path.strip_prefix("args.").unwrap_or(path);
    event.args.get(stripped)
}

fn values_equal(actual: &ArgValue, expected: &ArgValue) -> bool {
    match (actual.as_compare_str(), expected.as_compare_str()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

/// Numeric comparison coerces decimal-string arguments to
/// arbitrary-precision integers. A type or parse mismatch yields
/// `None`, which callers treat as no-match, never an error.
fn numeric_cmp(actual: &ArgValue, expected: &ArgValue) -> Option<std::cmp::Ordering> {
    let a: BigInt = actual.as_compare_str()?.parse().ok()?;
    let b: BigInt = expected.as_compare_str()?.parse().ok()?;
    Some(a.cmp(&b))
}

fn contains(actual: &ArgValue, expected: &ArgValue) -> bool {
    match (actual.as_compare_str(), expected.as_compare_str()) {
        (Some(haystack), Some(needle)) => haystack.contains(needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_types::FilterMap;

    fn event_with(args: &[(&str, ArgValue)]) -> BlockchainEvent {
        let mut map = relay_types::argvalue::ArgMap::new();
        for (k, v) in args {
            map.insert(k.to_string(), v.clone());
        }
        BlockchainEvent {
            contract_address: "0x0000000000000000000000000000000000000000".to_string(),
            event_name: "Transfer".to_string(),
            block_number: 1,
            tx_hash: "0xabc".to_string(),
            log_index: 0,
            args: map,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let event = event_with(&[]);
        assert!(matches(&event, &FilterMap::new()));
    }

    #[test]
    fn eq_predicate_matches_equal_address() {
        let event = event_with(&[("from", ArgValue::Address("0xaaaa".to_string()))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.from".to_string(),
            FilterPredicate::Eq {
                value: ArgValue::Address("0xaaaa".to_string()),
            },
        );
        assert!(matches(&event, &filter));
    }

    #[test]
    fn eq_predicate_rejects_unequal_value() {
        let event = event_with(&[("from", ArgValue::Address("0xaaaa".to_string()))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.from".to_string(),
            FilterPredicate::Eq {
                value: ArgValue::Address("0xbbbb".to_string()),
            },
        );
        assert!(!matches(&event, &filter));
    }

    #[test]
    fn gt_predicate_compares_bigint_decimal_strings() {
        let event = event_with(&[("value", ArgValue::BigInt("1000000000000000000".to_string()))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.value".to_string(),
            FilterPredicate::Gt {
                value: ArgValue::BigInt("999999999999999999".to_string()),
            },
        );
        assert!(matches(&event, &filter));
    }

    #[test]
    fn type_mismatch_in_numeric_comparison_is_nomatch_not_error() {
        let event = event_with(&[("value", ArgValue::Bool(true))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.value".to_string(),
            FilterPredicate::Gt {
                value: ArgValue::BigInt("1".to_string()),
            },
        );
        assert!(!matches(&event, &filter));
    }

    #[test]
    fn missing_argument_path_is_nomatch() {
        let event = event_with(&[]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.missing".to_string(),
            FilterPredicate::Eq {
                value: ArgValue::Bool(true),
            },
        );
        assert!(!matches(&event, &filter));
    }

    #[test]
    fn in_predicate_matches_any_member() {
        let event = event_with(&[("from", ArgValue::Address("0xaaaa".to_string()))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.from".to_string(),
            FilterPredicate::In {
                values: vec![
                    ArgValue::Address("0xcccc".to_string()),
                    ArgValue::Address("0xaaaa".to_string()),
                ],
            },
        );
        assert!(matches(&event, &filter));
    }

    #[test]
    fn contains_predicate_matches_substring() {
        let event = event_with(&[("memo", ArgValue::Str("hello world".to_string()))]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.memo".to_string(),
            FilterPredicate::Contains {
                value: ArgValue::Str("world".to_string()),
            },
        );
        assert!(matches(&event, &filter));
    }

    #[test]
    fn all_predicates_must_match_for_and_semantics() {
        let event = event_with(&[
            ("from", ArgValue::Address("0xaaaa".to_string())),
            ("value", ArgValue::BigInt("5".to_string())),
        ]);
        let mut filter = FilterMap::new();
        filter.insert(
            "args.from".to_string(),
            FilterPredicate::Eq {
                value: ArgValue::Address("0xaaaa".to_string()),
            },
        );
        filter.insert(
            "args.value".to_string(),
            FilterPredicate::Gt {
                value: ArgValue::BigInt("10".to_string()),
            },
        );
        assert!(!matches(&event, &filter));
    }
}
