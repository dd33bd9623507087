// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::callbacks::NextDelay;
use crate::constants::{DEFAULT_EXPONENTIAL_FACTOR, DEFAULT_LINEAR_OFFSET};

/// Strategy used to compute the delay inserted before each retry.
///
/// The first retry always waits for the configured initial delay. Every later retry asks the
/// strategy for the next delay given the one applied before it:
///
/// | Strategy | Recurrence |
/// |----------|------------|
/// | [`Constant`][DelayStrategy::Constant] | `next = current` |
/// | [`Linear`][DelayStrategy::Linear] | `next = current + offset` |
/// | [`Exponential`][DelayStrategy::Exponential] | `next = current * factor` |
/// | [`Fibonacci`][DelayStrategy::Fibonacci] | `d0, d1, d0 + d1, d1 + (d0 + d1), ...` |
/// | [`Custom`][DelayStrategy::Custom] | caller-supplied function |
///
/// Linear and exponential strategies accept a reset modulus: every `m`-th transition yields
/// the initial delay again instead of growing, which produces periodic backoff resets.
///
/// Strategies never clamp. The configured maximum delay is applied on top of every strategy
/// by [`Delays`], so all strategies share the same ceiling.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rebound::DelayStrategy;
///
/// let delays: Vec<_> = DelayStrategy::exponential(2.0)
///     .delays(Duration::from_millis(100), Some(Duration::from_millis(500)))
///     .take(5)
///     .collect();
///
/// assert_eq!(
///     delays,
///     [100, 200, 400, 500, 500].map(Duration::from_millis).to_vec()
/// );
/// ```
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub enum DelayStrategy {
    /// The same delay before every retry.
    #[default]
    Constant,

    /// The delay grows by a fixed offset on every transition.
    Linear {
        /// Added to the previous delay.
        offset: Duration,
        /// Every `reset_every`-th transition restarts from the initial delay.
        reset_every: Option<NonZeroU32>,
    },

    /// The delay is multiplied by a fixed factor on every transition.
    Exponential {
        /// Multiplier applied to the previous delay.
        factor: f64,
        /// Every `reset_every`-th transition restarts from the initial delay.
        reset_every: Option<NonZeroU32>,
    },

    /// Delays follow the Fibonacci recurrence seeded by the initial delay.
    Fibonacci {
        /// The second seed. When `None`, both seeds equal the initial delay.
        second: Option<Duration>,
    },

    /// A caller-supplied recurrence.
    Custom(NextDelay),
}

impl DelayStrategy {
    /// A constant delay.
    #[must_use]
    pub fn constant() -> Self {
        Self::Constant
    }

    /// A delay that grows by `offset` on every transition.
    #[must_use]
    pub fn linear(offset: Duration) -> Self {
        Self::Linear { offset, reset_every: None }
    }

    /// A delay that grows by the default offset of 100 ms on every transition.
    #[must_use]
    pub fn linear_default() -> Self {
        Self::linear(DEFAULT_LINEAR_OFFSET)
    }

    /// A delay that doubles on every transition.
    #[must_use]
    pub fn exponential_default() -> Self {
        Self::exponential(DEFAULT_EXPONENTIAL_FACTOR)
    }

    /// A delay that is multiplied by `factor` on every transition.
    ///
    /// The factor must be finite and non-negative, otherwise the run fails with
    /// [`ConfigError::InvalidFactor`][crate::ConfigError::InvalidFactor] before any attempt.
    #[must_use]
    pub fn exponential(factor: f64) -> Self {
        Self::Exponential { factor, reset_every: None }
    }

    /// A Fibonacci delay sequence where both seeds equal the initial delay.
    #[must_use]
    pub fn fibonacci() -> Self {
        Self::Fibonacci { second: None }
    }

    /// A Fibonacci delay sequence seeded by the initial delay and `second`.
    #[must_use]
    pub fn fibonacci_with(second: Duration) -> Self {
        Self::Fibonacci { second: Some(second) }
    }

    /// A caller-supplied recurrence from the previously applied delay to the next one.
    ///
    /// ```
    /// use std::time::Duration;
    /// use rebound::DelayStrategy;
    ///
    /// let strategy = DelayStrategy::custom(|current| current + current / 2);
    /// let delays: Vec<_> = strategy.delays(Duration::from_millis(100), None).take(3).collect();
    ///
    /// assert_eq!(delays, [100, 150, 225].map(Duration::from_millis).to_vec());
    /// ```
    #[must_use]
    pub fn custom(next: impl Fn(Duration) -> Duration + Send + Sync + 'static) -> Self {
        Self::Custom(NextDelay::new(next))
    }

    /// Restarts the sequence from the initial delay on every `every`-th transition.
    ///
    /// Only linear and exponential strategies honor the modulus; `0` disables it.
    #[must_use]
    pub fn reset_every(self, every: u32) -> Self {
        let every = NonZeroU32::new(every);
        match self {
            Self::Linear { offset, .. } => Self::Linear { offset, reset_every: every },
            Self::Exponential { factor, .. } => Self::Exponential { factor, reset_every: every },
            other => other,
        }
    }

    /// Creates the stateful sequence used by a single run.
    #[must_use]
    pub fn sequence(&self, initial: Duration) -> DelaySequence {
        let state = match self {
            Self::Constant => SequenceState::Constant,
            Self::Linear { offset, reset_every } => SequenceState::Linear {
                offset: *offset,
                reset: Reset::new(*reset_every),
            },
            Self::Exponential { factor, reset_every } => SequenceState::Exponential {
                factor: *factor,
                reset: Reset::new(*reset_every),
            },
            Self::Fibonacci { second } => SequenceState::Fibonacci {
                next: second.unwrap_or(initial),
                after: initial.saturating_add(second.unwrap_or(initial)),
            },
            Self::Custom(next) => SequenceState::Custom(next.clone()),
        };

        DelaySequence { initial, state }
    }

    /// The clamped delays applied before retry 1, 2, 3, ... of a run.
    ///
    /// The first item is the initial delay, every later item is produced by the strategy from
    /// the previous item. Each item is clamped to `max_delay`, including the initial delay.
    #[must_use]
    pub fn delays(&self, initial: Duration, max_delay: Option<Duration>) -> Delays {
        Delays {
            sequence: self.sequence(initial),
            max_delay,
            current: None,
        }
    }

    pub(crate) fn factor(&self) -> Option<f64> {
        match self {
            Self::Exponential { factor, .. } => Some(*factor),
            _ => None,
        }
    }
}

/// The per-run state of a [`DelayStrategy`].
///
/// [`next`][DelaySequence::next] is called once per retry transition after the first one.
#[derive(Debug)]
pub struct DelaySequence {
    initial: Duration,
    state: SequenceState,
}

#[derive(Debug)]
enum SequenceState {
    Constant,
    Linear { offset: Duration, reset: Reset },
    Exponential { factor: f64, reset: Reset },
    Fibonacci { next: Duration, after: Duration },
    Custom(NextDelay),
}

impl DelaySequence {
    /// Computes the delay that follows `current`.
    pub fn next(&mut self, current: Duration) -> Duration {
        match &mut self.state {
            SequenceState::Constant => current,
            SequenceState::Linear { offset, reset } => {
                if reset.tick() {
                    self.initial
                } else {
                    current.saturating_add(*offset)
                }
            }
            SequenceState::Exponential { factor, reset } => {
                if reset.tick() {
                    self.initial
                } else {
                    mul_saturating(current, *factor)
                }
            }
            SequenceState::Fibonacci { next, after } => {
                let delay = *next;
                *next = *after;
                *after = delay.saturating_add(*after);
                delay
            }
            SequenceState::Custom(next) => next.call(current),
        }
    }

    /// The delay this sequence started from.
    #[must_use]
    pub fn initial(&self) -> Duration {
        self.initial
    }
}

/// Counts transitions and reports when the reset modulus is hit.
#[derive(Debug)]
struct Reset {
    every: Option<NonZeroU32>,
    transitions: u32,
}

impl Reset {
    fn new(every: Option<NonZeroU32>) -> Self {
        Self { every, transitions: 0 }
    }

    fn tick(&mut self) -> bool {
        let Some(every) = self.every else {
            return false;
        };

        self.transitions += 1;
        if self.transitions == every.get() {
            self.transitions = 0;
            true
        } else {
            false
        }
    }
}

/// Iterator over the clamped delays of a run, see [`DelayStrategy::delays`].
#[derive(Debug)]
pub struct Delays {
    sequence: DelaySequence,
    max_delay: Option<Duration>,
    current: Option<Duration>,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.current {
            None => self.sequence.initial(),
            Some(current) => self.sequence.next(current),
        };

        let delay = clamp_to_max(raw, self.max_delay);
        self.current = Some(delay);
        Some(delay)
    }
}

fn clamp_to_max(delay: Duration, max: Option<Duration>) -> Duration {
    max.map_or(delay, |max| min(delay, max))
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "delays are rounded to whole nanoseconds and saturate outside the u64 range"
)]
fn mul_saturating(delay: Duration, factor: f64) -> Duration {
    let nanos = delay.as_nanos() as f64 * factor;
    if nanos.is_nan() || nanos <= 0.0 {
        return Duration::ZERO;
    }

    if nanos >= u64::MAX as f64 {
        return Duration::MAX;
    }

    Duration::from_nanos(nanos.round() as u64)
}
