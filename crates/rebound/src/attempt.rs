// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// A single attempt within a backoff run.
///
/// Tracks the zero-based attempt index and whether this attempt is the last one the retry
/// budget allows. On the last attempt every failure is final, regardless of the retry
/// predicate.
///
/// # Examples
///
/// ```
/// use rebound::Attempt;
///
/// let attempt = Attempt::new(0, false);
/// assert!(attempt.is_first());
/// assert!(!attempt.is_last());
///
/// let last = Attempt::new(4, true);
/// assert_eq!(last.index(), 4);
/// assert!(last.is_last());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new(0, true)
    }
}

impl Attempt {
    /// Creates an attempt with the given index.
    #[must_use]
    pub fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    /// Returns true for attempt 0.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.index == 0
    }

    /// Returns true if the retry budget allows no further attempt after this one.
    #[must_use]
    pub fn is_last(self) -> bool {
        self.is_last
    }

    /// Returns the zero-based attempt index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Number of attempts made once this attempt has run.
    #[must_use]
    pub fn count(self) -> u32 {
        self.index.saturating_add(1)
    }

    /// The first attempt of a run with a budget of `max_attempts` total attempts.
    pub(crate) fn first(max_attempts: u32) -> Self {
        Self::new(0, max_attempts <= 1)
    }

    /// The attempt following this one, or `None` once the budget is spent.
    pub(crate) fn increment(self, max_attempts: u32) -> Option<Self> {
        if self.is_last {
            return None;
        }

        let index = self.index.saturating_add(1);
        if index >= max_attempts {
            return None;
        }

        Some(Self::new(index, index >= max_attempts.saturating_sub(1)))
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}
