// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Retries fallible async operations with configurable backoff.
//!
//! A [`Backoff`] invokes an operation until it succeeds, the attempt budget is spent, or a
//! retry predicate decides a failure is not worth retrying. Between attempts it waits for a
//! delay computed by a [`DelayStrategy`], optionally bounded by a maximum delay. Each attempt
//! can be raced against a per-attempt timeout.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use rebound::{Backoff, BackoffError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backoff = Backoff::new()
//!     .service(|| async { fetch_inventory().await })
//!     .retry_if(|error: &String| !error.starts_with("fatal"))
//!     .exponential(2.0)
//!     .initial_delay(Duration::from_millis(10))
//!     .max_delay(Duration::from_secs(1))
//!     .timeout(Duration::from_secs(5))
//!     .max_retries(4);
//!
//! match backoff.run().await {
//!     Ok(items) => println!("{items} items in stock"),
//!     Err(BackoffError::RetryLimitReached { attempts, .. }) => println!("gave up after {attempts} attempts"),
//!     Err(error) => println!("{error}"),
//! }
//! # }
//! # async fn fetch_inventory() -> Result<u32, String> { Ok(42) }
//! ```
//!
//! # Attempts and Delays
//!
//! `max_retries` is the total attempt budget: attempt indices run from `0` to
//! `max_retries - 1`. The delay before attempt 1 is the initial delay, the delay before every
//! later attempt is derived from the previous one by the [`DelayStrategy`]:
//!
//! | Strategy | Next delay |
//! |----------|------------|
//! | [`Constant`][DelayStrategy::Constant] | the initial delay |
//! | [`Linear`][DelayStrategy::Linear] | previous + offset |
//! | [`Exponential`][DelayStrategy::Exponential] | previous × factor |
//! | [`Fibonacci`][DelayStrategy::Fibonacci] | sum of the two previous delays |
//! | [`Custom`][DelayStrategy::Custom] | a caller-supplied function of the previous delay |
//!
//! Every delay, the initial one included, is clamped to the maximum delay, and the clamped
//! value feeds the next computation.
//!
//! # Outcomes
//!
//! A run resolves exactly once:
//!
//! - `Ok(value)` when an attempt succeeds.
//! - [`BackoffError::Operation`] when the retry predicate rejects a failure.
//! - [`BackoffError::RetryLimitReached`] when the last attempt fails or times out.
//! - [`BackoffError::Configuration`] when the options are invalid. The operation is never
//!   invoked in this case.
//!
//! A timed out attempt is abandoned: its future is dropped and its eventual result is never
//! observed.
//!
//! # Scheduling
//!
//! By default attempts run one after another ([`ScheduleMode::Serial`]).
//! [`ScheduleMode::Racing`] starts each attempt as soon as its delay elapses, even when the
//! previous attempts have not finished yet, and takes the first decisive result.
//!
//! # Diagnostics
//!
//! When [`debug`][Backoff::debug] is enabled, every transition is reported to a
//! [`Diagnostics`] sink as an [`Event`]. The default sink, [`TracingDiagnostics`], emits
//! [`tracing`] events named `rebound.backoff`. Closures receiving the elapsed time and the
//! event can be used as sinks too.
//!
//! # Features
//!
//! - `serde`: implements `Serialize` and `Deserialize` for [`BackoffConfig`].

mod attempt;
mod callbacks;
mod config;
mod constants;
mod delay;
mod diagnostics;
mod engine;
mod error;
mod executor;
mod options;
mod status;

pub use attempt::Attempt;
pub use callbacks::NextDelay;
pub use config::{BackoffConfig, StrategyConfig};
pub use delay::{DelaySequence, DelayStrategy, Delays};
pub use diagnostics::{Diagnostics, Event, TracingDiagnostics};
pub use engine::ScheduleMode;
pub use error::{BackoffError, ConfigError};
pub use options::Backoff;
pub use status::Status;
