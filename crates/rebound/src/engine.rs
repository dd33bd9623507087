// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::time::Instant;

use crate::delay::Delays;
use crate::diagnostics::Emitter;
use crate::executor::{AttemptExecutor, AttemptOutcome};
use crate::options::RunOptions;
use crate::status::Settled;
use crate::{Attempt, Backoff, BackoffError, Event, Status};

/// How a run schedules its attempts.
///
/// Both modes produce the same outcomes for the same operation: the same attempt budget, the
/// same delays, the same retry predicate and exactly one terminal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ScheduleMode {
    /// One attempt at a time. The next attempt starts after the previous one failed and its
    /// delay elapsed.
    #[default]
    Serial,

    /// The next attempt starts as soon as its delay elapses, even if earlier attempts are
    /// still in flight. The first attempt to succeed or fail for good decides the run and
    /// every other pending attempt is dropped.
    Racing,
}

impl<T, E> Backoff<T, E>
where
    T: Send,
    E: Send,
{
    /// Runs the operation until it succeeds, fails for good, or the attempt budget is spent.
    ///
    /// Uses the configured [`ScheduleMode`]. Configuration problems are reported as
    /// [`BackoffError::Configuration`] without invoking the operation.
    ///
    /// Dropping the returned future cancels the in-flight attempt and any pending delay.
    ///
    /// # Errors
    ///
    /// - [`BackoffError::Configuration`] if no operation is set, the attempt budget is zero or
    ///   the exponential factor is invalid.
    /// - [`BackoffError::Operation`] if the retry predicate refused to retry a failure.
    /// - [`BackoffError::RetryLimitReached`] if every allowed attempt failed or timed out.
    pub async fn run(&self) -> Result<T, BackoffError<E>> {
        self.run_with(self.mode).await
    }

    /// Runs the operation with an explicit [`ScheduleMode`].
    ///
    /// # Errors
    ///
    /// See [`run`][Backoff::run].
    pub async fn run_with(&self, mode: ScheduleMode) -> Result<T, BackoffError<E>> {
        self.status.set(Status::Running);

        let result = match self.snapshot() {
            Ok(options) => {
                let engine = Engine::new(&options, Emitter::new(self.debug, &self.diagnostics));
                match mode {
                    ScheduleMode::Serial => engine.run_serial().await,
                    ScheduleMode::Racing => engine.run_racing().await,
                }
            }
            Err(error) => Err(BackoffError::Configuration(error)),
        };

        self.status.set(if result.is_ok() { Status::Succeeded } else { Status::Failed });
        result
    }
}

/// How an attempt ended, as seen by the scheduler.
enum Completion<T, E> {
    Finished(AttemptOutcome<T, E>),
    TimedOut(Duration),
}

/// Mutable state of one run.
struct RunState<E> {
    attempt: Attempt,
    delays: Delays,
    last_error: Option<E>,
    succeeded: bool,
    settled: Settled,
}

impl<E> RunState<E> {
    fn new<T>(options: &RunOptions<T, E>) -> Self {
        Self {
            attempt: Attempt::first(options.max_retries),
            delays: options.strategy.delays(options.initial_delay, options.max_delay),
            last_error: None,
            succeeded: false,
            settled: Settled::default(),
        }
    }

    fn next_delay(&mut self) -> Duration {
        self.delays.next().unwrap_or_default()
    }

    fn exhausted(&mut self) -> BackoffError<E> {
        BackoffError::RetryLimitReached {
            attempts: self.attempt.count(),
            last_error: self.last_error.take(),
        }
    }

    fn finish<T>(&self, result: Result<T, BackoffError<E>>) -> Result<T, BackoffError<E>> {
        let first = self.settled.settle();
        debug_assert!(first, "a run must resolve exactly once");
        result
    }
}

struct Engine<'a, T, E> {
    options: &'a RunOptions<T, E>,
    executor: AttemptExecutor<'a, T, E>,
    emitter: Emitter,
}

impl<'a, T, E> Engine<'a, T, E> {
    fn new(options: &'a RunOptions<T, E>, emitter: Emitter) -> Self {
        Self {
            options,
            executor: AttemptExecutor::new(&options.operation, &options.retry_if),
            emitter,
        }
    }

    async fn run_serial(&self) -> Result<T, BackoffError<E>> {
        let mut state = RunState::new(self.options);

        loop {
            let (attempt, completion) = self.timed_attempt(state.attempt).await;

            if let Some(result) = self.observe(&mut state, attempt, completion) {
                return state.finish(result);
            }

            let Some(next) = attempt.increment(self.options.max_retries) else {
                let error = state.exhausted();
                return state.finish(Err(error));
            };

            let delay = state.next_delay();
            self.emitter.emit(Event::Retrying { attempt, delay });

            tokio::time::sleep(delay).await;
            state.attempt = next;
        }
    }

    async fn run_racing(&self) -> Result<T, BackoffError<E>> {
        let mut state = RunState::new(self.options);
        let mut in_flight = FuturesUnordered::new();
        in_flight.push(self.timed_attempt(state.attempt));

        let mut pending = state.attempt.increment(self.options.max_retries);
        let first_delay = if pending.is_some() { state.next_delay() } else { Duration::ZERO };
        let mut timer = std::pin::pin!(tokio::time::sleep_until(deadline_after(first_delay)));

        loop {
            tokio::select! {
                biased;

                Some((attempt, completion)) = in_flight.next() => {
                    if let Some(result) = self.observe(&mut state, attempt, completion) {
                        return state.finish(result);
                    }

                    let delay = if pending.is_some() {
                        timer.deadline().saturating_duration_since(Instant::now())
                    } else {
                        Duration::ZERO
                    };
                    self.emitter.emit(Event::Retrying { attempt, delay });
                }

                () = &mut timer, if pending.is_some() && !state.succeeded && !state.settled.is_settled() => {
                    if let Some(attempt) = pending.take() {
                        state.attempt = attempt;
                        in_flight.push(self.timed_attempt(attempt));

                        pending = attempt.increment(self.options.max_retries);
                        if pending.is_some() {
                            let delay = state.next_delay();
                            timer.as_mut().reset(deadline_after(delay));
                        }
                    }
                }

                else => {
                    let error = state.exhausted();
                    return state.finish(Err(error));
                }
            }
        }
    }

    /// Runs one attempt, racing it against the per-attempt timeout when one is configured.
    ///
    /// Whichever side finishes first decides; the other is dropped without being observed.
    async fn timed_attempt(&self, attempt: Attempt) -> (Attempt, Completion<T, E>) {
        self.emitter.emit(Event::AttemptStarted { attempt });

        let completion = match self.options.timeout {
            None => Completion::Finished(self.executor.execute(attempt).await),
            Some(timeout) => tokio::select! {
                biased;

                outcome = self.executor.execute(attempt) => Completion::Finished(outcome),
                () = tokio::time::sleep(timeout) => Completion::TimedOut(timeout),
            },
        };

        (attempt, completion)
    }

    /// Applies the completion of `attempt` to the run and returns the terminal result, if any.
    fn observe(&self, state: &mut RunState<E>, attempt: Attempt, completion: Completion<T, E>) -> Option<Result<T, BackoffError<E>>> {
        match completion {
            Completion::Finished(AttemptOutcome::Success(value)) => {
                state.succeeded = true;
                self.emitter.emit(Event::Succeeded { attempt });
                Some(Ok(value))
            }
            Completion::Finished(AttemptOutcome::FinalFailure { error, budget_exhausted }) => {
                self.emitter.emit(Event::Failed { attempt });
                if budget_exhausted {
                    Some(Err(BackoffError::RetryLimitReached {
                        attempts: attempt.count(),
                        last_error: Some(error),
                    }))
                } else {
                    Some(Err(BackoffError::Operation(error)))
                }
            }
            Completion::Finished(AttemptOutcome::RetryableFailure(error)) => {
                state.last_error = Some(error);
                None
            }
            Completion::TimedOut(timeout) => {
                self.emitter.emit(Event::TimedOut { attempt, timeout });
                if attempt.is_last() {
                    self.emitter.emit(Event::Failed { attempt });
                    Some(Err(BackoffError::RetryLimitReached {
                        attempts: attempt.count(),
                        last_error: state.last_error.take(),
                    }))
                } else {
                    None
                }
            }
        }
    }
}

/// Deadline `delay` from now, saturating far in the future instead of overflowing.
fn deadline_after(delay: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}
