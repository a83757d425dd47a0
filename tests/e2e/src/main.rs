/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Relay End-to-End Test Suite
//!
//! Holistic checks against a running relay-server, exercising the
//! operational surface an operator actually touches in production.
//!
//! Prerequisites:
//! - A running relay-server, reachable at RELAY_URL
//!
//! Run with: cargo run --manifest-path tests/e2e/Cargo.toml

mod api;
mod scenarios;

use std::env;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let relay_url = env::var("RELAY_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    println!("Relay End-to-End Test Suite");
    println!("Relay URL: {relay_url}");
    println!();

    let client = api::Client::new(&relay_url);

    println!("Waiting for relay-server to be ready...");
    if let Err(e) = client.wait_for_ready(30).await {
        eprintln!("relay-server not ready: {e}");
        return ExitCode::FAILURE;
    }
    println!("relay-server is ready\n");

    let mut passed = 0;
    let mut failed = 0;

    macro_rules! run_scenario {
        ($name:expr, $scenario:expr) => {{
            println!("--- {} ---", $name);
            match $scenario.await {
                Ok(()) => {
                    println!("{} PASSED\n", $name);
                    passed += 1;
                }
                Err(e) => {
                    println!("{} FAILED: {}\n", $name, e);
                    failed += 1;
                }
            }
        }};
    }

    run_scenario!("Health & Readiness", scenarios::test_health(&client));
    run_scenario!("Metrics Exposition", scenarios::test_metrics(&client));
    run_scenario!("Dead-Letter Admin Surface", scenarios::test_dlq_admin(&client));

    println!("==========================================");
    println!("Results: {passed} passed, {failed} failed");
    println!("==========================================");

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
