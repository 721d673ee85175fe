use std::ops::ControlFlow;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use super::Reason;
use super::Strategy;
use super::as_nanos;
use super::nanos_since;

/// The mutable half of a [`FixedWindow`].
#[derive(Debug)]
struct RateBudget {
    /// Always within `[0, capacity]`.
    available: usize,
    /// Start of the current window, in nanoseconds from the clock anchor.
    /// Only ever moves forward.
    window_anchor: u64,
}

/// A fixed-window admission counter.
///
/// Hands out at most `capacity` admissions per window. The first check made
/// after the window has fully elapsed restarts the window at that instant and
/// resets the budget to `capacity`. A partially elapsed window grants nothing
/// back.
///
/// A `capacity` of zero denies every request. A zero `window` counts as
/// already expired, so the budget is restored on every check.
#[derive(Debug)]
pub struct FixedWindow {
    capacity: usize,
    window_ns: u64,
    budget: Mutex<RateBudget>,
    clock: Clock,
    anchor: Instant,
}

impl Strategy for FixedWindow {
    fn process(&self) -> ControlFlow<Reason> {
        let now = self.now();
        let mut budget = self.budget();
        self.refill(&mut budget, now);

        if budget.available > 0 {
            budget.available -= 1;
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(Reason::Exhausted {
                retry_after: self.until_refill(&budget, now),
            })
        }
    }

    fn remaining(&self) -> usize {
        self.peek_available()
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of admissions within a single window.
    /// * `window` - The duration of the window.
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self::with_clock(capacity, window, Clock::new())
    }

    /// Creates a new `FixedWindow` reading time from `clock`.
    pub fn with_clock(capacity: usize, window: Duration, clock: Clock) -> Self {
        let anchor = clock.now();
        Self {
            capacity,
            window_ns: as_nanos(window),
            budget: Mutex::new(RateBudget {
                available: capacity,
                window_anchor: 0,
            }),
            clock,
            anchor,
        }
    }

    /// Admits one operation if the budget allows it.
    pub fn try_admit(&self) -> bool {
        self.process().is_continue()
    }

    /// Admissions left in the current window, after applying any due refill.
    ///
    /// Does not consume anything.
    pub fn peek_available(&self) -> usize {
        let now = self.now();
        let mut budget = self.budget();
        self.refill(&mut budget, now);
        budget.available
    }

    /// Time left until the current window expires, or zero once it has.
    pub fn time_until_refill(&self) -> Duration {
        let now = self.now();
        let budget = self.budget();
        self.until_refill(&budget, now)
    }

    /// The configured maximum per window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn now(&self) -> u64 {
        nanos_since(&self.clock, self.anchor)
    }

    // Holding the guard across refill and decrement keeps check-and-take atomic.
    fn budget(&self) -> MutexGuard<'_, RateBudget> {
        self.budget.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, budget: &mut RateBudget, now: u64) {
        if now.saturating_sub(budget.window_anchor) >= self.window_ns {
            budget.available = self.capacity;
            budget.window_anchor = budget.window_anchor.max(now);
        }
    }

    fn until_refill(&self, budget: &RateBudget, now: u64) -> Duration {
        let elapsed = now.saturating_sub(budget.window_anchor);
        Duration::from_nanos(self.window_ns.saturating_sub(elapsed))
    }
}
