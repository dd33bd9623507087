// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Level;

use crate::Attempt;
use crate::constants::LOG_TARGET;

/// A transition reported to [`Diagnostics`] while a run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// The operation is about to be invoked.
    AttemptStarted {
        /// The attempt being started.
        attempt: Attempt,
    },

    /// The attempt succeeded; the run is over.
    Succeeded {
        /// The successful attempt.
        attempt: Attempt,
    },

    /// The attempt failed and no further attempt will be made.
    Failed {
        /// The failed attempt.
        attempt: Attempt,
    },

    /// The attempt failed and another attempt is scheduled after `delay`.
    Retrying {
        /// The failed attempt.
        attempt: Attempt,
        /// Time to wait before the next attempt starts.
        delay: Duration,
    },

    /// The attempt did not complete within the per-attempt timeout.
    TimedOut {
        /// The abandoned attempt.
        attempt: Attempt,
        /// The configured per-attempt timeout.
        timeout: Duration,
    },
}

impl Event {
    /// The attempt this event refers to.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        match *self {
            Self::AttemptStarted { attempt }
            | Self::Succeeded { attempt }
            | Self::Failed { attempt }
            | Self::Retrying { attempt, .. }
            | Self::TimedOut { attempt, .. } => attempt,
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttemptStarted { attempt } => write!(f, "attempt {attempt} started"),
            Self::Succeeded { attempt } => write!(f, "attempt {attempt} succeeded"),
            Self::Failed { attempt } => write!(f, "attempt {attempt} failed"),
            Self::Retrying { attempt, delay } => {
                write!(f, "attempt {attempt} failed, retrying after {}ms", delay.as_millis())
            }
            Self::TimedOut { attempt, timeout } => {
                write!(f, "attempt {attempt} timed out after {}ms", timeout.as_millis())
            }
        }
    }
}

/// Receives run transitions when debugging is enabled on a [`Backoff`][crate::Backoff].
///
/// Implementations must not influence the run; the engine ignores everything a sink does.
/// Closures taking `(Duration, &Event)` implement this trait.
pub trait Diagnostics: Send + Sync {
    /// Records `event`, which happened `elapsed` after the run started.
    fn log(&self, elapsed: Duration, event: &Event);
}

impl<F> Diagnostics for F
where
    F: Fn(Duration, &Event) + Send + Sync,
{
    fn log(&self, elapsed: Duration, event: &Event) {
        self(elapsed, event);
    }
}

/// The default diagnostics sink, forwarding events to [`tracing`].
///
/// Progress is reported at `DEBUG`, retries and timeouts at `WARN`. Every event carries the
/// `attempt.index`, `attempt.is_last` and `elapsed_ms` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, elapsed: Duration, event: &Event) {
        let attempt = event.attempt();
        let elapsed_ms = millis(elapsed);

        match *event {
            Event::AttemptStarted { .. } | Event::Succeeded { .. } => tracing::event!(
                name: "rebound.backoff",
                target: LOG_TARGET,
                Level::DEBUG,
                attempt.index = attempt.index(),
                attempt.is_last = attempt.is_last(),
                elapsed_ms,
                "{event}"
            ),
            Event::Failed { .. } => tracing::event!(
                name: "rebound.backoff",
                target: LOG_TARGET,
                Level::WARN,
                attempt.index = attempt.index(),
                attempt.is_last = attempt.is_last(),
                elapsed_ms,
                "{event}"
            ),
            Event::Retrying { delay, .. } => tracing::event!(
                name: "rebound.backoff",
                target: LOG_TARGET,
                Level::WARN,
                attempt.index = attempt.index(),
                attempt.is_last = attempt.is_last(),
                elapsed_ms,
                delay_ms = millis(delay),
                "{event}"
            ),
            Event::TimedOut { timeout, .. } => tracing::event!(
                name: "rebound.backoff",
                target: LOG_TARGET,
                Level::WARN,
                attempt.index = attempt.index(),
                attempt.is_last = attempt.is_last(),
                elapsed_ms,
                timeout_ms = millis(timeout),
                "{event}"
            ),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Forwards events of one run to the configured sink, if debugging is enabled.
pub(crate) struct Emitter {
    sink: Option<Arc<dyn Diagnostics>>,
    started: Instant,
}

impl Emitter {
    pub(crate) fn new(enabled: bool, sink: &Arc<dyn Diagnostics>) -> Self {
        Self {
            sink: enabled.then(|| Arc::clone(sink)),
            started: Instant::now(),
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        if let Some(sink) = &self.sink {
            sink.log(self.started.elapsed(), &event);
        }
    }
}

impl Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("enabled", &self.sink.is_some())
            .field("started", &self.started)
            .finish()
    }
}
