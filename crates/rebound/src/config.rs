// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::constants::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};
use crate::{Backoff, DelayStrategy};

/// Plain-data form of the [`Backoff`] options, suitable for configuration files.
///
/// With the `serde` feature enabled this type implements `Serialize` and `Deserialize`.
/// Missing fields take the same defaults as [`Backoff::new`], durations are whole milliseconds.
///
/// The operation, the retry predicate and the diagnostics sink are code, so they are not part
/// of the configuration and are preserved by [`Backoff::apply_config`].
///
/// # Examples
///
/// ```
/// use rebound::{Backoff, BackoffConfig, StrategyConfig};
///
/// let config = BackoffConfig {
///     max_retries: 4,
///     strategy: StrategyConfig::Exponential { factor: 1.5, reset_every: 0 },
///     ..BackoffConfig::default()
/// };
///
/// let backoff = Backoff::<(), ()>::from_config(&config);
/// assert_eq!(backoff.config(), config);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Total attempt budget, including the first attempt.
    pub max_retries: u32,
    /// Upper bound of every delay, in milliseconds. `None` leaves delays unbounded.
    pub max_delay_ms: Option<u64>,
    /// Per-attempt timeout, in milliseconds. `None` disables the timeout.
    pub timeout_ms: Option<u64>,
    /// Enables diagnostics.
    pub debug: bool,
    /// How delays evolve between attempts.
    pub strategy: StrategyConfig,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: millis(DEFAULT_INITIAL_DELAY),
            max_retries: DEFAULT_MAX_RETRIES,
            max_delay_ms: None,
            timeout_ms: None,
            debug: false,
            strategy: StrategyConfig::Constant,
        }
    }
}

/// Plain-data form of a [`DelayStrategy`].
///
/// Serialized with a `kind` tag, for example `{ "kind": "linear", "offset_ms": 100 }`.
/// A `reset_every` of zero disables the periodic reset.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum StrategyConfig {
    /// See [`DelayStrategy::Constant`].
    #[default]
    Constant,

    /// See [`DelayStrategy::Linear`].
    Linear {
        /// Added to the previous delay, in milliseconds.
        offset_ms: u64,
        /// Every `reset_every`-th transition restarts from the initial delay.
        #[cfg_attr(feature = "serde", serde(default))]
        reset_every: u32,
    },

    /// See [`DelayStrategy::Exponential`].
    Exponential {
        /// Multiplier applied to the previous delay.
        factor: f64,
        /// Every `reset_every`-th transition restarts from the initial delay.
        #[cfg_attr(feature = "serde", serde(default))]
        reset_every: u32,
    },

    /// See [`DelayStrategy::Fibonacci`].
    Fibonacci {
        /// The second seed in milliseconds. When absent, both seeds equal the initial delay.
        #[cfg_attr(feature = "serde", serde(default))]
        second_ms: Option<u64>,
    },
}

impl StrategyConfig {
    /// Converts the configuration into a [`DelayStrategy`].
    #[must_use]
    pub fn to_strategy(&self) -> DelayStrategy {
        match *self {
            Self::Constant => DelayStrategy::constant(),
            Self::Linear { offset_ms, reset_every } => {
                DelayStrategy::linear(Duration::from_millis(offset_ms)).reset_every(reset_every)
            }
            Self::Exponential { factor, reset_every } => DelayStrategy::exponential(factor).reset_every(reset_every),
            Self::Fibonacci { second_ms: None } => DelayStrategy::fibonacci(),
            Self::Fibonacci { second_ms: Some(second) } => DelayStrategy::fibonacci_with(Duration::from_millis(second)),
        }
    }

    /// Describes `strategy` as configuration.
    ///
    /// Returns `None` for [`DelayStrategy::Custom`], which has no data form.
    #[must_use]
    pub fn from_strategy(strategy: &DelayStrategy) -> Option<Self> {
        match *strategy {
            DelayStrategy::Constant => Some(Self::Constant),
            DelayStrategy::Linear { offset, reset_every } => Some(Self::Linear {
                offset_ms: millis(offset),
                reset_every: reset_every.map_or(0, NonZeroU32::get),
            }),
            DelayStrategy::Exponential { factor, reset_every } => Some(Self::Exponential {
                factor,
                reset_every: reset_every.map_or(0, NonZeroU32::get),
            }),
            DelayStrategy::Fibonacci { second } => Some(Self::Fibonacci {
                second_ms: second.map(millis),
            }),
            DelayStrategy::Custom(_) => None,
        }
    }
}

impl<T, E> Backoff<T, E> {
    /// Creates a backoff from configuration. The operation still has to be set.
    #[must_use]
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new().apply_config(config)
    }

    /// Replaces every configurable option with the values in `config`.
    ///
    /// The operation, the retry predicate, the diagnostics sink and the schedule mode are kept.
    #[must_use]
    pub fn apply_config(mut self, config: &BackoffConfig) -> Self {
        self.initial_delay = Duration::from_millis(config.initial_delay_ms);
        self.max_retries = config.max_retries;
        self.max_delay = config.max_delay_ms.map(Duration::from_millis);
        self.timeout = config.timeout_ms.map(Duration::from_millis);
        self.debug = config.debug;
        self.strategy = config.strategy.to_strategy();
        self
    }

    /// Describes the current options as configuration.
    ///
    /// A [custom][DelayStrategy::Custom] delay strategy is reported as
    /// [`StrategyConfig::Constant`], since it has no data form.
    #[must_use]
    pub fn config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: millis(self.initial_delay),
            max_retries: self.max_retries,
            max_delay_ms: self.max_delay.map(millis),
            timeout_ms: self.timeout.map(millis),
            debug: self.debug,
            strategy: StrategyConfig::from_strategy(&self.strategy).unwrap_or_default(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builder() {
        assert_eq!(Backoff::<(), ()>::new().config(), BackoffConfig::default());
    }

    #[test]
    fn apply_config_sets_every_option() {
        let config = BackoffConfig {
            initial_delay_ms: 250,
            max_retries: 3,
            max_delay_ms: Some(1_000),
            timeout_ms: Some(500),
            debug: true,
            strategy: StrategyConfig::Linear {
                offset_ms: 50,
                reset_every: 4,
            },
        };

        let backoff = Backoff::<(), ()>::from_config(&config);

        assert_eq!(backoff.initial_delay, Duration::from_millis(250));
        assert_eq!(backoff.max_retries, 3);
        assert_eq!(backoff.max_delay, Some(Duration::from_secs(1)));
        assert_eq!(backoff.timeout, Some(Duration::from_millis(500)));
        assert!(backoff.debug);
        assert!(matches!(
            backoff.strategy,
            DelayStrategy::Linear { offset, reset_every: Some(every) } if offset == Duration::from_millis(50) && every.get() == 4
        ));
        assert_eq!(backoff.config(), config);
    }

    #[test]
    fn apply_config_keeps_operation() {
        let backoff = Backoff::<u32, ()>::new()
            .service(|| async { Ok(1) })
            .apply_config(&BackoffConfig::default());

        assert!(backoff.operation.is_some());
    }

    #[test]
    fn strategy_conversions() {
        for config in [
            StrategyConfig::Constant,
            StrategyConfig::Linear {
                offset_ms: 10,
                reset_every: 0,
            },
            StrategyConfig::Exponential {
                factor: 3.0,
                reset_every: 2,
            },
            StrategyConfig::Fibonacci { second_ms: None },
            StrategyConfig::Fibonacci { second_ms: Some(7) },
        ] {
            assert_eq!(StrategyConfig::from_strategy(&config.to_strategy()), Some(config));
        }
    }

    #[test]
    fn custom_strategy_has_no_config() {
        let strategy = DelayStrategy::custom(|current| current * 3);
        assert_eq!(StrategyConfig::from_strategy(&strategy), None);

        let backoff = Backoff::<(), ()>::new().delay_strategy(strategy);
        assert_eq!(backoff.config().strategy, StrategyConfig::Constant);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_partial_document() {
        let config: BackoffConfig = serde_json::from_str(
            r#"{
                "max_retries": 5,
                "timeout_ms": 2000,
                "strategy": { "kind": "exponential", "factor": 1.5 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config,
            BackoffConfig {
                max_retries: 5,
                timeout_ms: Some(2_000),
                strategy: StrategyConfig::Exponential {
                    factor: 1.5,
                    reset_every: 0
                },
                ..BackoffConfig::default()
            }
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_uses_kind_tag() {
        let config = BackoffConfig {
            strategy: StrategyConfig::Fibonacci { second_ms: Some(20) },
            ..BackoffConfig::default()
        };

        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["strategy"]["kind"], "fibonacci");
        assert_eq!(json["strategy"]["second_ms"], 20);
        assert_eq!(json["initial_delay_ms"], 100);
        assert!(json["max_delay_ms"].is_null());
    }
}
