// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// The lifecycle of a [`Backoff`][crate::Backoff] run.
///
/// ```text
/// Idle -> Running -> Succeeded
///                 \-> Failed
/// ```
///
/// [`Backoff::status`][crate::Backoff::status] reports the state of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Status {
    /// No run has started yet.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run produced a value.
    Succeeded,
    /// The last run produced an error.
    Failed,
}

impl Status {
    /// Returns true for [`Succeeded`][Status::Succeeded] and [`Failed`][Status::Failed].
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Succeeded => 2,
            Self::Failed => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl Default for StatusCell {
    fn default() -> Self {
        Self(AtomicU8::new(Status::Idle.to_u8()))
    }
}

impl StatusCell {
    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: Status) {
        self.0.store(status.to_u8(), Ordering::Release);
    }
}

/// Guards the terminal resolution of a run: only the first `settle` call wins.
#[derive(Debug, Default)]
pub(crate) struct Settled(AtomicBool);

impl Settled {
    /// Returns true for the first caller only.
    pub(crate) fn settle(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_cell_round_trips_every_state() {
        let cell = StatusCell::default();
        assert_eq!(cell.get(), Status::Idle);

        for status in [Status::Running, Status::Succeeded, Status::Failed, Status::Idle] {
            cell.set(status);
            assert_eq!(cell.get(), status);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!Status::Idle.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(Status::Succeeded.is_terminal());
        assert!(Status::Failed.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(Status::Running.to_string(), "running");
        assert_eq!(Status::Failed.to_string(), "failed");
    }

    #[test]
    fn settle_wins_once() {
        let settled = Settled::default();
        assert!(!settled.is_settled());

        assert!(settled.settle());
        assert!(!settled.settle());
        assert!(settled.is_settled());
    }
}
