/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Typed argument envelope for decoded event arguments and subscription
//! filters.
//!
//! Decoded event arguments use a closed variant set rather than an
//! open JSON bag: an address, an arbitrary-precision integer carried
//! as a decimal string, a byte-string, a bool, or a nested array of
//! the same. Formatter output still serializes this down to
//! `serde_json::Value` at the JSON boundary — only the internal
//! pipeline is typed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single decoded event argument, or filter literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    /// A 20-byte EVM address, rendered as `0x`-prefixed lowercase hex.
    Address(String),
    /// An arbitrary-precision integer, carried as a decimal string so it
    /// survives JSON round-trips without precision loss.
    BigInt(String),
    /// An arbitrary byte string, rendered as `0x`-prefixed hex.
    Bytes(String),
    /// A UTF-8 string argument.
    Str(String),
    /// A boolean argument.
    Bool(bool),
    /// A nested array of arguments, e.g. a `uint256[]` log parameter.
    Array(Vec<ArgValue>),
}

impl ArgValue {
    /// Renders the value the way a filter predicate compares it: as a
    /// plain string, with arrays left un-renderable (a predicate never
    /// matches an array directly).
    pub fn as_compare_str(&self) -> Option<&str> {
        match self {
            ArgValue::Address(s) | ArgValue::BigInt(s) | ArgValue::Bytes(s) | ArgValue::Str(s) => {
                Some(s.as_str())
            }
            ArgValue::Bool(_) | ArgValue::Array(_) => None,
        }
    }

    /// Converts the value to `serde_json::Value` for formatter output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Address(s) | ArgValue::BigInt(s) | ArgValue::Bytes(s) | ArgValue::Str(s) => {
                serde_json::Value::String(s.clone())
            }
            ArgValue::Bool(b) => serde_json::Value::Bool(*b),
            ArgValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ArgValue::to_json).collect())
            }
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Address(s) | ArgValue::BigInt(s) | ArgValue::Bytes(s) | ArgValue::Str(s) => {
                write!(f, "{s}")
            }
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A map of decoded argument names to values, as produced by log
/// decoding.
pub type ArgMap = BTreeMap<String, ArgValue>;

/// The closed set of filter predicates a subscription's filter map may
/// apply to a dotted argument path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterPredicate {
    /// Equality against a literal.
    Eq { value: ArgValue },
    /// Inequality against a literal.
    Ne { value: ArgValue },
    /// Greater-than, numeric (decimal-string arguments coerced to
    /// arbitrary-precision integers).
    Gt { value: ArgValue },
    /// Less-than, numeric.
    Lt { value: ArgValue },
    /// Set membership.
    In { values: Vec<ArgValue> },
    /// Substring containment.
    Contains { value: ArgValue },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_renders_as_plain_string() {
        let v = ArgValue::Address("0xabc".to_string());
        assert_eq!(v.to_string(), "0xabc");
        assert_eq!(v.as_compare_str(), Some("0xabc"));
    }

    #[test]
    fn array_has_no_compare_str() {
        let v = ArgValue::Array(vec![ArgValue::Bool(true)]);
        assert_eq!(v.as_compare_str(), None);
    }

    #[test]
    fn filter_predicate_roundtrips_through_json() {
        let p = FilterPredicate::Gt {
            value: ArgValue::BigInt("1000".to_string()),
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: FilterPredicate = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
