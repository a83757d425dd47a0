/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Decodes a raw chain log into a [`BlockchainEvent`], given the
//! canonical event signature declared by the matching subscription(s).
//!
//! Signatures carry no `indexed` annotations (they are a bare
//! `Name(type1,type2,...)` string), so every
//! parameter is decoded from the log's ABI-encoded `data` word list
//! rather than split across topics and data as a fully-annotated ABI
//! would allow. This is a deliberate simplification, noted in
//! DESIGN.md.

use chrono::Utc;
use ethers::abi::{Abi, ParamType, Token};
use ethers::types::Log;
use relay_types::{ArgMap, ArgValue, BlockchainEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event signature {0:?}")]
    MalformedSignature(String),
    #[error("abi parse error: {0}")]
    Abi(String),
    #[error("log data did not match signature {signature:?}: {source}")]
    Mismatch {
        signature: String,
        source: ethers::abi::Error,
    },
}

/// Decodes `log` against `signature`, producing the `BlockchainEvent`
/// the rest of the pipeline consumes. `log_index` and `block_number`
/// must already be present on `log` (the caller is responsible for
/// only passing confirmed logs with resolved indices).
pub fn decode_log(signature: &str, log: &Log) -> Result<BlockchainEvent, DecodeError> {
    let event_name = event_name(signature)?;
    let param_types = parse_param_types(signature)?;

    let tokens = ethers::abi::decode(&param_types, &log.data)
        .map_err(|source| DecodeError::Mismatch { signature: signature.to_string(), source })?;

    let mut args = ArgMap::new();
    for (index, token) in tokens.into_iter().enumerate() {
        args.insert(format!("arg{index}"), token_to_argvalue(&token));
    }

    Ok(BlockchainEvent {
        contract_address: format!("{:#x}", log.address),
        event_name,
        block_number: log.block_number.map(|n| n.as_u64()).unwrap_or_default(),
        tx_hash: log.transaction_hash.map(|h| format!("{h:#x}")).unwrap_or_default(),
        log_index: log.log_index.map(|i| i.as_u32()).unwrap_or_default(),
        args,
        observed_at: Utc::now(),
    })
}

/// The topic0 hash a subscription's `event_signatures` entry resolves
/// to, used to build the chain-side log filter.
pub fn topic0(signature: &str) -> ethers::types::H256 {
    ethers::types::H256::from(ethers::utils::keccak256(signature.as_bytes()))
}

fn event_name(signature: &str) -> Result<String, DecodeError> {
    let open = signature
        .find('(')
        .ok_or_else(|| DecodeError::MalformedSignature(signature.to_string()))?;
    Ok(signature[..open].to_string())
}

fn parse_param_types(signature: &str) -> Result<Vec<ParamType>, DecodeError> {
    let open = signature
        .find('(')
        .ok_or_else(|| DecodeError::MalformedSignature(signature.to_string()))?;
    if !signature.ends_with(')') {
        return Err(DecodeError::MalformedSignature(signature.to_string()));
    }
    let inner = &signature[open + 1..signature.len() - 1];
    if inner.is_empty() {
        return Ok(vec![]);
    }

    // Human-readable ABI parsing wants a full `event Name(type,...)`
    // declaration; build one from the bare signature and pull the
    // parameter types back out rather than hand-rolling a type-string
    // parser.
    let def = format!("event Sig({inner})");
    let abi: Abi = ethers::abi::parse_abi(&[&def]).map_err(|e| DecodeError::Abi(e.to_string()))?;
    let event = abi
        .event("Sig")
        .map_err(|e| DecodeError::Abi(e.to_string()))?;
    Ok(event.inputs.iter().map(|p| p.kind.clone()).collect())
}

fn token_to_argvalue(token: &Token) -> ArgValue {
    match token {
        Token::Address(addr) => ArgValue::Address(format!("{addr:#x}")),
        Token::Uint(v) => ArgValue::BigInt(v.to_string()),
        Token::Int(v) => ArgValue::BigInt(v.to_string()),
        Token::Bool(b) => ArgValue::Bool(*b),
        Token::String(s) => ArgValue::Str(s.clone()),
        Token::Bytes(b) | Token::FixedBytes(b) => ArgValue::Bytes(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) => {
            ArgValue::Array(items.iter().map(token_to_argvalue).collect())
        }
        Token::Tuple(items) => ArgValue::Array(items.iter().map(token_to_argvalue).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_extracts_identifier_before_parens() {
        assert_eq!(event_name("Transfer(address,address,uint256)").unwrap(), "Transfer");
    }

    #[test]
    fn malformed_signature_without_parens_is_rejected() {
        assert!(event_name("Transfer").is_err());
    }

    #[test]
    fn topic0_is_stable_for_equal_signatures() {
        let a = topic0("Transfer(address,address,uint256)");
        let b = topic0("Transfer(address,address,uint256)");
        assert_eq!(a, b);
    }

    #[test]
    fn topic0_differs_for_different_signatures() {
        let a = topic0("Transfer(address,address,uint256)");
        let b = topic0("Approval(address,address,uint256)");
        assert_ne!(a, b);
    }
}
