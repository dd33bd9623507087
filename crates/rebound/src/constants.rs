// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default delay before the first retry.
pub(crate) const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default total attempt budget, including the first attempt.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default multiplier of [`DelayStrategy::exponential_default`][crate::DelayStrategy::exponential_default].
pub(crate) const DEFAULT_EXPONENTIAL_FACTOR: f64 = 2.0;

/// Default offset of [`DelayStrategy::linear_default`][crate::DelayStrategy::linear_default].
pub(crate) const DEFAULT_LINEAR_OFFSET: Duration = Duration::from_millis(100);

/// Target used for events emitted by the tracing diagnostics sink.
pub(crate) const LOG_TARGET: &str = "rebound::backoff";
