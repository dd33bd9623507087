// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Attempt;
use crate::callbacks::{Operation, RetryIf};

/// The classified result of a single attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AttemptOutcome<T, E> {
    Success(T),
    /// No further attempt may follow. `budget_exhausted` is false when the retry predicate
    /// vetoed the retry while attempts remained.
    FinalFailure { error: E, budget_exhausted: bool },
    RetryableFailure(E),
}

/// Invokes the operation and decides whether its failure may be retried.
#[derive(Debug)]
pub(crate) struct AttemptExecutor<'a, T, E> {
    operation: &'a Operation<T, E>,
    retry_if: &'a RetryIf<E>,
}

impl<'a, T, E> AttemptExecutor<'a, T, E> {
    pub(crate) fn new(operation: &'a Operation<T, E>, retry_if: &'a RetryIf<E>) -> Self {
        Self { operation, retry_if }
    }

    /// Invokes the operation exactly once.
    pub(crate) async fn execute(&self, attempt: Attempt) -> AttemptOutcome<T, E> {
        let result = self.operation.call().await;
        self.classify(result, attempt)
    }

    pub(crate) fn classify(&self, result: Result<T, E>, attempt: Attempt) -> AttemptOutcome<T, E> {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(error) if attempt.is_last() => AttemptOutcome::FinalFailure {
                error,
                budget_exhausted: true,
            },
            Err(error) if self.retry_if.call(&error) => AttemptOutcome::RetryableFailure(error),
            Err(error) => AttemptOutcome::FinalFailure {
                error,
                budget_exhausted: false,
            },
        }
    }
}
