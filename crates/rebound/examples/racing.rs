// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Racing example: attempts against a slow dependency overlap instead of waiting for each
//! other. The next attempt starts as soon as its delay elapses and the first attempt to
//! succeed wins.

use std::time::Duration;

use rebound::{Backoff, BackoffError, Event, ScheduleMode};
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), BackoffError<String>> {
    for mode in [ScheduleMode::Serial, ScheduleMode::Racing] {
        let backoff = Backoff::new()
            .service(execute_operation)
            .constant()
            .initial_delay(Duration::from_millis(100))
            .max_retries(8)
            .schedule(mode)
            .debug(true)
            .diagnostics(move |elapsed: Duration, event: &Event| {
                println!("  [{mode:?} +{}ms] {event}", elapsed.as_millis());
            });

        let started = Instant::now();
        let output = backoff.run().await?;
        println!("{mode:?}: {output} after {}ms", started.elapsed().as_millis());
    }

    Ok(())
}

// Slow responses, one in three attempts succeeds
async fn execute_operation() -> Result<&'static str, String> {
    let latency = fastrand::u64(200..400);
    tokio::time::sleep(Duration::from_millis(latency)).await;

    if fastrand::u8(0..3) == 0 {
        Ok("response")
    } else {
        Err(format!("dependency unavailable after {latency}ms"))
    }
}
