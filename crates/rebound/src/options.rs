// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use crate::callbacks::{Operation, RetryIf};
use crate::constants::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};
use crate::status::StatusCell;
use crate::{ConfigError, DelayStrategy, Diagnostics, ScheduleMode, Status, TracingDiagnostics};

/// Retries a fallible async operation with backoff.
///
/// `Backoff` is configured through chained builder methods and executed with
/// [`run`][Backoff::run]. Every option has a default:
///
/// | Option | Default | Configured by |
/// |--------|---------|---------------|
/// | Operation | none, the run fails with [`ConfigError::ServiceNotSet`] | [`service`][Backoff::service], [`service_with_args`][Backoff::service_with_args] |
/// | Retry predicate | retry every failure | [`retry_if`][Backoff::retry_if] |
/// | Initial delay | 100 ms | [`initial_delay`][Backoff::initial_delay] |
/// | Delay strategy | constant | [`delay_strategy`][Backoff::delay_strategy] and shorthands |
/// | Max retries | 10 total attempts | [`max_retries`][Backoff::max_retries] |
/// | Max delay | unbounded | [`max_delay`][Backoff::max_delay] |
/// | Per-attempt timeout | disabled | [`timeout`][Backoff::timeout] |
/// | Debug diagnostics | disabled | [`debug`][Backoff::debug], [`diagnostics`][Backoff::diagnostics] |
/// | Schedule mode | [`ScheduleMode::Serial`] | [`schedule`][Backoff::schedule] |
///
/// `max_retries` is the total attempt budget: with `max_retries(5)` the operation runs at most
/// five times, with attempt indices `0..5`.
///
/// Each run takes a snapshot of the options when it starts. Builder methods consume the
/// `Backoff`, so options cannot change while a run borrows it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rebound::Backoff;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backoff = Backoff::new()
///     .service(|| async { Ok::<_, std::io::Error>("connected") })
///     .exponential(2.0)
///     .initial_delay(Duration::from_millis(50))
///     .max_delay(Duration::from_secs(2))
///     .max_retries(5);
///
/// assert_eq!(backoff.run().await.unwrap(), "connected");
/// # }
/// ```
pub struct Backoff<T, E> {
    pub(crate) operation: Option<Operation<T, E>>,
    pub(crate) retry_if: RetryIf<E>,
    pub(crate) initial_delay: Duration,
    pub(crate) strategy: DelayStrategy,
    pub(crate) max_retries: u32,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) debug: bool,
    pub(crate) diagnostics: Arc<dyn Diagnostics>,
    pub(crate) mode: ScheduleMode,
    pub(crate) status: StatusCell,
}

impl<T, E> Default for Backoff<T, E> {
    fn default() -> Self {
        Self {
            operation: None,
            retry_if: RetryIf::always(),
            initial_delay: DEFAULT_INITIAL_DELAY,
            strategy: DelayStrategy::Constant,
            max_retries: DEFAULT_MAX_RETRIES,
            max_delay: None,
            timeout: None,
            debug: false,
            diagnostics: Arc::new(TracingDiagnostics),
            mode: ScheduleMode::Serial,
            status: StatusCell::default(),
        }
    }
}

impl<T, E> Backoff<T, E> {
    /// Creates a backoff with default options and no operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation to retry.
    ///
    /// The closure is invoked once per attempt and must produce a fresh future each time.
    /// Retried invocations are not deduplicated, so the operation should be idempotent.
    #[must_use]
    pub fn service<F, Fut>(mut self, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.operation = Some(Operation::new(move || operation().boxed()));
        self
    }

    /// Sets the operation to retry together with the arguments it is invoked with.
    ///
    /// Every attempt receives its own clone of `args`.
    ///
    /// ```
    /// use rebound::Backoff;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let backoff = Backoff::new().service_with_args(
    ///     |(a, b): (u32, u32)| async move { Ok::<_, String>(a + b) },
    ///     (40, 2),
    /// );
    ///
    /// assert_eq!(backoff.run().await.unwrap(), 42);
    /// # }
    /// ```
    #[must_use]
    pub fn service_with_args<A, F, Fut>(mut self, operation: F, args: A) -> Self
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.operation = Some(Operation::new(move || operation(args.clone()).boxed()));
        self
    }

    /// Sets the predicate that decides whether a failure may be retried.
    ///
    /// The predicate is consulted only while attempts remain. Returning `false` ends the run
    /// with [`BackoffError::Operation`][crate::BackoffError::Operation].
    ///
    /// **Default**: every failure is retried.
    #[must_use]
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = RetryIf::new(predicate);
        self
    }

    /// Sets the delay applied before the first retry.
    ///
    /// **Default**: 100 ms
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the strategy computing every delay after the first.
    ///
    /// **Default**: [`DelayStrategy::Constant`]
    #[must_use]
    pub fn delay_strategy(mut self, strategy: DelayStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Uses the same delay before every retry.
    #[must_use]
    pub fn constant(self) -> Self {
        self.delay_strategy(DelayStrategy::constant())
    }

    /// Grows the delay by `offset` on every retry.
    #[must_use]
    pub fn linear(self, offset: Duration) -> Self {
        self.delay_strategy(DelayStrategy::linear(offset))
    }

    /// Multiplies the delay by `factor` on every retry.
    #[must_use]
    pub fn exponential(self, factor: f64) -> Self {
        self.delay_strategy(DelayStrategy::exponential(factor))
    }

    /// Uses Fibonacci delays where both seeds equal `seed`, which also becomes the initial delay.
    #[must_use]
    pub fn fibonacci(self, seed: Duration) -> Self {
        self.initial_delay(seed).delay_strategy(DelayStrategy::fibonacci())
    }

    /// Uses Fibonacci delays seeded by `first` and `second`; `first` becomes the initial delay.
    #[must_use]
    pub fn fibonacci_pair(self, first: Duration, second: Duration) -> Self {
        self.initial_delay(first).delay_strategy(DelayStrategy::fibonacci_with(second))
    }

    /// Sets the total attempt budget, including the first attempt.
    ///
    /// A budget of zero is rejected by [`run`][Backoff::run] with
    /// [`ConfigError::InvalidMaxRetries`].
    ///
    /// **Default**: 10
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Caps every delay, including the initial one.
    ///
    /// **Default**: unbounded
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Removes the delay cap.
    #[must_use]
    pub fn unbounded_delay(mut self) -> Self {
        self.max_delay = None;
        self
    }

    /// Races every attempt against a timer of `timeout`.
    ///
    /// An attempt that does not finish in time is abandoned and treated as a retryable failure.
    /// When the abandoned attempt was the last one, the run fails with
    /// [`BackoffError::RetryLimitReached`][crate::BackoffError::RetryLimitReached].
    ///
    /// **Default**: disabled
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disables the per-attempt timeout.
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Enables or disables diagnostics.
    ///
    /// Diagnostics never change how a run behaves.
    ///
    /// **Default**: false
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Sets the sink receiving diagnostics when [`debug`][Backoff::debug] is enabled.
    ///
    /// **Default**: [`TracingDiagnostics`]
    #[must_use]
    pub fn diagnostics(mut self, sink: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    /// Sets how attempts are scheduled by [`run`][Backoff::run].
    ///
    /// **Default**: [`ScheduleMode::Serial`]
    #[must_use]
    pub fn schedule(mut self, mode: ScheduleMode) -> Self {
        self.mode = mode;
        self
    }

    /// The state of the most recent run.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// Validates the options and freezes them for one run.
    pub(crate) fn snapshot(&self) -> Result<RunOptions<T, E>, ConfigError> {
        let Some(operation) = &self.operation else {
            return Err(ConfigError::ServiceNotSet);
        };

        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }

        if let Some(factor) = self.strategy.factor()
            && (!factor.is_finite() || factor < 0.0)
        {
            return Err(ConfigError::InvalidFactor(factor));
        }

        Ok(RunOptions {
            operation: operation.clone(),
            retry_if: self.retry_if.clone(),
            initial_delay: self.initial_delay,
            strategy: self.strategy.clone(),
            max_retries: self.max_retries,
            max_delay: self.max_delay,
            timeout: self.timeout,
        })
    }
}

impl<T, E> Debug for Backoff<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff")
            .field("service_set", &self.operation.is_some())
            .field("initial_delay", &self.initial_delay)
            .field("strategy", &self.strategy)
            .field("max_retries", &self.max_retries)
            .field("max_delay", &self.max_delay)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("mode", &self.mode)
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

/// Options frozen at the start of a run.
#[derive(Debug)]
pub(crate) struct RunOptions<T, E> {
    pub(crate) operation: Operation<T, E>,
    pub(crate) retry_if: RetryIf<E>,
    pub(crate) initial_delay: Duration,
    pub(crate) strategy: DelayStrategy,
    pub(crate) max_retries: u32,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Backoff<String, String>: Send, Sync, Debug);
    }

    #[test]
    fn defaults() {
        let backoff = Backoff::<(), ()>::new();

        assert!(backoff.operation.is_none());
        assert!(backoff.retry_if.call(&()));
        assert_eq!(backoff.initial_delay, Duration::from_millis(100));
        assert!(matches!(backoff.strategy, DelayStrategy::Constant));
        assert_eq!(backoff.max_retries, 10);
        assert_eq!(backoff.max_delay, None);
        assert_eq!(backoff.timeout, None);
        assert!(!backoff.debug);
        assert_eq!(backoff.mode, ScheduleMode::Serial);
        assert_eq!(backoff.status(), Status::Idle);
    }

    #[test]
    fn setters_apply() {
        let backoff = Backoff::<(), String>::new()
            .service(|| async { Ok(()) })
            .retry_if(|error: &String| error.contains("transient"))
            .initial_delay(Duration::from_millis(5))
            .linear(Duration::from_millis(7))
            .max_retries(3)
            .max_delay(Duration::from_secs(1))
            .timeout(Duration::from_millis(250))
            .debug(true)
            .schedule(ScheduleMode::Racing);

        assert!(backoff.operation.is_some());
        assert!(backoff.retry_if.call(&"transient glitch".to_string()));
        assert!(!backoff.retry_if.call(&"fatal".to_string()));
        assert_eq!(backoff.initial_delay, Duration::from_millis(5));
        assert!(matches!(backoff.strategy, DelayStrategy::Linear { offset, .. } if offset == Duration::from_millis(7)));
        assert_eq!(backoff.max_retries, 3);
        assert_eq!(backoff.max_delay, Some(Duration::from_secs(1)));
        assert_eq!(backoff.timeout, Some(Duration::from_millis(250)));
        assert!(backoff.debug);
        assert_eq!(backoff.mode, ScheduleMode::Racing);

        let backoff = backoff.unbounded_delay().no_timeout();
        assert_eq!(backoff.max_delay, None);
        assert_eq!(backoff.timeout, None);
    }

    #[test]
    fn fibonacci_sets_initial_delay() {
        let backoff = Backoff::<(), ()>::new().fibonacci(Duration::from_millis(10));
        assert_eq!(backoff.initial_delay, Duration::from_millis(10));
        assert!(matches!(backoff.strategy, DelayStrategy::Fibonacci { second: None }));

        let backoff = Backoff::<(), ()>::new().fibonacci_pair(Duration::from_millis(3), Duration::from_millis(4));
        assert_eq!(backoff.initial_delay, Duration::from_millis(3));
        assert!(matches!(
            backoff.strategy,
            DelayStrategy::Fibonacci { second: Some(second) } if second == Duration::from_millis(4)
        ));
    }

    #[test]
    fn snapshot_rejects_missing_service() {
        let error = Backoff::<(), ()>::new().snapshot().unwrap_err();

        assert_eq!(error, ConfigError::ServiceNotSet);
    }

    #[test]
    fn snapshot_rejects_zero_budget() {
        let error = Backoff::<(), ()>::new()
            .service(|| async { Ok(()) })
            .max_retries(0)
            .snapshot()
            .unwrap_err();

        assert_eq!(error, ConfigError::InvalidMaxRetries);
    }

    #[test]
    fn snapshot_rejects_invalid_factor() {
        for factor in [-1.0, f64::INFINITY] {
            let error = Backoff::<(), ()>::new()
                .service(|| async { Ok(()) })
                .exponential(factor)
                .snapshot()
                .unwrap_err();

            assert_eq!(error, ConfigError::InvalidFactor(factor));
        }

        let error = Backoff::<(), ()>::new()
            .service(|| async { Ok(()) })
            .exponential(f64::NAN)
            .snapshot()
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidFactor(factor) if factor.is_nan()));
    }

    #[test]
    fn snapshot_copies_options() {
        let options = Backoff::<(), ()>::new()
            .service(|| async { Ok(()) })
            .initial_delay(Duration::from_millis(20))
            .max_retries(4)
            .snapshot()
            .unwrap();

        assert_eq!(options.initial_delay, Duration::from_millis(20));
        assert_eq!(options.max_retries, 4);
        assert_eq!(options.max_delay, None);
    }

    #[test]
    fn debug_output() {
        let output = format!("{:?}", Backoff::<(), ()>::new());

        assert!(output.contains("service_set: false"));
        assert!(output.contains("max_retries: 10"));
    }
}
