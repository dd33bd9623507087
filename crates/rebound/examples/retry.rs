// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Basic retry example: an operation that fails transiently is retried with exponential backoff
//! while every transition is logged to the console.

use std::io::Error;
use std::time::Duration;

use rebound::{Backoff, BackoffError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), BackoffError<Error>> {
    // Set up tracing subscriber for logs to console
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let backoff = Backoff::new()
        .service_with_args(execute_operation, "value".to_string())
        // Only transient errors are worth another attempt
        .retry_if(|error: &Error| error.kind() == std::io::ErrorKind::Other)
        .exponential(2.0)
        .initial_delay(Duration::from_millis(50))
        .max_delay(Duration::from_secs(1))
        .timeout(Duration::from_millis(200))
        .max_retries(6)
        .debug(true);

    match backoff.run().await {
        Ok(output) => println!("execution succeeded, result: {output}"),
        Err(BackoffError::RetryLimitReached { attempts, last_error }) => {
            println!("gave up after {attempts} attempts, last error: {last_error:?}");
        }
        Err(e) => return Err(e),
    }

    Ok(())
}

// 60% chance of failing with a transient error
async fn execute_operation(input: String) -> Result<String, Error> {
    if fastrand::u8(0..10) < 6 {
        Err(Error::other("transient execution error"))
    } else {
        Ok(input)
    }
}
