// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A configuration problem detected before the first attempt.
///
/// Configuration errors are reported by [`Backoff::run`][crate::Backoff::run] without invoking
/// the operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No operation was configured.
    #[error("service must be set before running backoff")]
    ServiceNotSet,

    /// The attempt budget is zero.
    #[error("max retries must be greater than zero")]
    InvalidMaxRetries,

    /// The exponential factor is negative, infinite or NaN.
    #[error("exponential factor must be finite and non-negative, got {0}")]
    InvalidFactor(f64),
}

/// The terminal failure of a backoff run.
///
/// Exactly one of these, or the success value, is produced per run. Intermediate retryable
/// failures are never surfaced.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackoffError<E> {
    /// The run was rejected before any attempt.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The retry predicate refused to retry this failure while budget remained.
    #[error("operation failed: {0}")]
    Operation(E),

    /// Every allowed attempt failed.
    ///
    /// `last_error` holds the most recent failure returned by the operation. It is `None`
    /// when every attempt timed out before the operation produced a failure.
    #[error("maximum retry limit reached after {attempts} attempts")]
    RetryLimitReached {
        /// Attempts made, equal to the configured budget.
        attempts: u32,
        /// The last failure reported by the operation.
        last_error: Option<E>,
    },
}

impl<E> BackoffError<E> {
    /// Returns true if the attempt budget was exhausted.
    #[must_use]
    pub fn is_retry_limit_reached(&self) -> bool {
        matches!(self, Self::RetryLimitReached { .. })
    }

    /// Returns true if the run was rejected before any attempt.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The operation failure carried by this error, if any.
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::RetryLimitReached { last_error, .. } => last_error.as_ref(),
            Self::Configuration(_) => None,
        }
    }

    /// Consumes the error and returns the operation failure it carries, if any.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::RetryLimitReached { last_error, .. } => last_error,
            Self::Configuration(_) => None,
        }
    }
}
