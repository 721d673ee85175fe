//! # joke-limit
//!
//! `joke-limit` provides the admission control strategies used by `joke-client`
//! to keep a client inside its self-imposed request budget.
//!
//! ## Strategies
//!
//! * [`FixedWindow`]: at most `capacity` admissions per window. The window
//!   restarts at the first admission check after it has elapsed, and the
//!   budget is reset in full, never topped up partially.
//! * [`Reservoir`]: a reservoir of `capacity` admissions that is refilled
//!   to `capacity` at every window boundary, combined with a minimum spacing
//!   between two admitted operations. This is the strategy a queueing
//!   scheduler waits on.
//!
//! Both strategies are pure bookkeeping: they never sleep and never perform
//! I/O. A denial carries a [`Reason`] with a concrete `retry_after` hint.
//!
//! ## Example
//!
//! ```rust
//! use joke_limit::FixedWindow;
//! use joke_limit::Strategy;
//! use std::time::Duration;
//!
//! let window = FixedWindow::new(10, Duration::from_secs(60));
//!
//! if window.process().is_continue() {
//!     // Request allowed
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod fixed_window;
mod reservoir;

pub use fixed_window::FixedWindow;
pub use reservoir::Reservoir;

/// Reasons why an operation might be refused by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The budget for the current window is used up.
    Exhausted { retry_after: Duration },
    /// The budget has room, but the previous admission was too recent.
    TooSoon { retry_after: Duration },
}

impl Reason {
    /// How long the caller should wait before asking again.
    pub fn retry_after(&self) -> Duration {
        match self {
            Reason::Exhausted { retry_after } | Reason::TooSoon { retry_after } => *retry_after,
        }
    }
}

/// The core trait for all admission strategies.
///
/// Strategies are `Send` and `Sync` so one instance can be shared across
/// tasks and threads via `Arc`.
pub trait Strategy: Debug + Send + Sync {
    /// Attempts to admit a single operation.
    ///
    /// The check and the consumption of a unit are a single step: two
    /// concurrent callers can never both take the last unit.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the operation may not proceed now.
    fn process(&self) -> ControlFlow<Reason>;

    /// Units that could be admitted right now, after any pending refill.
    fn remaining(&self) -> usize;
}

/// Nanoseconds elapsed since `anchor`, saturating on overflow.
pub(crate) fn nanos_since(clock: &quanta::Clock, anchor: quanta::Instant) -> u64 {
    u64::try_from(clock.now().duration_since(anchor).as_nanos()).unwrap_or(u64::MAX)
}

/// Saturating conversion of a `Duration` to nanoseconds.
pub(crate) fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shareable<T: Send + Sync + ?Sized>() {}

    #[test]
    fn test_strategies_are_shareable() {
        shareable::<dyn Strategy>();
        shareable::<FixedWindow>();
        shareable::<Reservoir>();
    }

    #[test]
    fn test_retry_after() {
        let hint = Duration::from_millis(70);

        assert_eq!(Reason::Exhausted { retry_after: hint }.retry_after(), hint);
        assert_eq!(Reason::TooSoon { retry_after: hint }.retry_after(), hint);
    }
}
