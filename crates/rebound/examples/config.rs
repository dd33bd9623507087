// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Configuration example: backoff options are loaded from a JSON document and combined with
//! an operation in code.

use std::io::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rebound::{Backoff, BackoffConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const CONFIG: &str = r#"{
    "initial_delay_ms": 25,
    "max_retries": 5,
    "max_delay_ms": 200,
    "timeout_ms": 1000,
    "debug": true,
    "strategy": { "kind": "fibonacci" }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing subscriber for logs to console
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let config: BackoffConfig = serde_json::from_str(CONFIG)?;
    println!("loaded configuration: {config:?}");

    let calls = Arc::new(AtomicU32::new(0));
    let backoff = Backoff::from_config(&config).service_with_args(execute_operation, calls);

    let output = backoff.run().await?;
    println!("execution succeeded, result: {output}");

    // The effective options can be written back out
    println!("{}", serde_json::to_string_pretty(&backoff.config())?);

    Ok(())
}

// Fails the first three calls
async fn execute_operation(calls: Arc<AtomicU32>) -> Result<u32, Error> {
    let call = calls.fetch_add(1, Ordering::SeqCst);
    if call < 3 {
        Err(Error::other(format!("call {call} rejected")))
    } else {
        Ok(call)
    }
}
