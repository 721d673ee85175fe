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

#[derive(Debug)]
struct ReservoirState {
    remaining: usize,
    /// Index of the window `remaining` belongs to.
    window: u64,
    /// When the last admission happened, in nanoseconds from the anchor.
    last_admitted: Option<u64>,
}

/// A refilling reservoir with a minimum spacing between admissions.
///
/// Time is cut into consecutive windows of `window` length starting at
/// construction. On entering a new window the reservoir is reset to
/// `capacity`; unused units never carry over. On top of that, two admissions
/// are always at least `min_spacing` apart.
///
/// This strategy is meant to be waited on: every denial carries the time
/// until the earliest instant another admission could succeed.
#[derive(Debug)]
pub struct Reservoir {
    capacity: usize,
    window_ns: u64,
    spacing_ns: u64,
    state: Mutex<ReservoirState>,
    clock: Clock,
    anchor: Instant,
}

impl Strategy for Reservoir {
    fn process(&self) -> ControlFlow<Reason> {
        let now = self.now();
        let mut state = self.state();
        self.refresh(&mut state, now);

        if let Some(last) = state.last_admitted {
            let since = now.saturating_sub(last);
            if since < self.spacing_ns {
                return ControlFlow::Break(Reason::TooSoon {
                    retry_after: Duration::from_nanos(self.spacing_ns - since),
                });
            }
        }

        if state.remaining == 0 {
            return ControlFlow::Break(Reason::Exhausted {
                retry_after: self.until_refresh(now),
            });
        }

        state.remaining -= 1;
        state.last_admitted = Some(now);
        ControlFlow::Continue(())
    }

    fn remaining(&self) -> usize {
        let now = self.now();
        let mut state = self.state();
        self.refresh(&mut state, now);
        state.remaining
    }
}

impl Reservoir {
    /// Creates a new `Reservoir` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Admissions available in each window.
    /// * `window` - How often the reservoir is reset to `capacity`.
    /// * `min_spacing` - The smallest gap allowed between two admissions.
    pub fn new(capacity: usize, window: Duration, min_spacing: Duration) -> Self {
        Self::with_clock(capacity, window, min_spacing, Clock::new())
    }

    pub fn with_clock(
        capacity: usize,
        window: Duration,
        min_spacing: Duration,
        clock: Clock,
    ) -> Self {
        let anchor = clock.now();
        Self {
            capacity,
            window_ns: as_nanos(window),
            spacing_ns: as_nanos(min_spacing),
            state: Mutex::new(ReservoirState {
                remaining: capacity,
                window: 0,
                last_admitted: None,
            }),
            clock,
            anchor,
        }
    }

    /// Time until the reservoir is next reset, zero for a zero window.
    pub fn time_until_refresh(&self) -> Duration {
        self.until_refresh(self.now())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::from_nanos(self.spacing_ns)
    }

    fn now(&self) -> u64 {
        nanos_since(&self.clock, self.anchor)
    }

    fn state(&self) -> MutexGuard<'_, ReservoirState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, state: &mut ReservoirState, now: u64) {
        if self.window_ns == 0 {
            state.remaining = self.capacity;
            return;
        }
        let window = now / self.window_ns;
        if window > state.window {
            state.remaining = self.capacity;
            state.window = window;
        }
    }

    fn until_refresh(&self, now: u64) -> Duration {
        if self.window_ns == 0 {
            return Duration::ZERO;
        }
        let next = (now / self.window_ns).saturating_add(1).saturating_mul(self.window_ns);
        Duration::from_nanos(next - now)
    }
}
