//! What a consumer does while it waits on an empty queue.
//!
//! [`UnboundedChannel::dequeue`](super::unbounded_channel::UnboundedChannel::dequeue)
//! never blocks on an OS primitive. Each time it observes a genuinely empty
//! queue it asks its [`Waiter`] to pause before the next attempt. The default,
//! [`BusySpin`], keeps the thread hot; the other strategies trade hand-off
//! latency for CPU time. None of them changes ordering or delivery.

use std::thread;
use std::time::Duration;

use crossbeam::utils::Backoff as CrossbeamBackoff;

/// A policy for waiting on an empty queue.
///
/// A fresh [`Waiter`] is created for every blocking dequeue call, so waiters
/// may keep per-call state such as a back-off step.
pub trait WaitStrategy: Send + Sync {
    /// Per-call waiting state.
    type Waiter: Waiter;

    /// Creates the waiter for one dequeue call.
    fn waiter(&self) -> Self::Waiter;
}

/// Per-call waiting state handed out by a [`WaitStrategy`].
pub trait Waiter {
    /// Pauses once after the queue was observed empty.
    fn wait(&mut self);
}

/// Spins on the CPU between attempts. Never yields, never parks.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpin;

impl WaitStrategy for BusySpin {
    type Waiter = BusySpin;

    fn waiter(&self) -> BusySpin {
        BusySpin
    }
}

impl Waiter for BusySpin {
    #[inline]
    fn wait(&mut self) {
        std::hint::spin_loop();
    }
}

/// Exponential back-off: spins for a growing number of iterations, then
/// yields to the scheduler once the back-off is exhausted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Backoff;

impl WaitStrategy for Backoff {
    type Waiter = CrossbeamBackoff;

    fn waiter(&self) -> CrossbeamBackoff {
        CrossbeamBackoff::new()
    }
}

impl Waiter for CrossbeamBackoff {
    #[inline]
    fn wait(&mut self) {
        self.snooze();
    }
}

/// Spins a fixed number of times, then parks the thread for `park_for` on
/// every further empty observation.
///
/// Nothing unparks the consumer when an element arrives, so `park_for` bounds
/// the extra hand-off latency. A zero `park_for` yields instead of parking.
#[derive(Debug, Clone, Copy)]
pub struct SpinThenPark {
    /// Empty observations answered with a spin hint before parking starts.
    pub spins: u32,
    /// Upper bound on each park.
    pub park_for: Duration,
}

impl SpinThenPark {
    /// Creates a strategy that spins `spins` times before parking for
    /// `park_for` at a time.
    pub const fn new(spins: u32, park_for: Duration) -> Self {
        Self { spins, park_for }
    }
}

impl Default for SpinThenPark {
    fn default() -> Self {
        Self::new(1 << 10, Duration::from_micros(50))
    }
}

impl WaitStrategy for SpinThenPark {
    type Waiter = SpinThenParkWaiter;

    fn waiter(&self) -> SpinThenParkWaiter {
        SpinThenParkWaiter {
            remaining_spins: self.spins,
            park_for: self.park_for,
        }
    }
}

/// Waiter for [`SpinThenPark`].
#[derive(Debug)]
pub struct SpinThenParkWaiter {
    remaining_spins: u32,
    park_for: Duration,
}

impl SpinThenParkWaiter {
    /// Returns `true` once the spin phase is over.
    pub fn is_parking(&self) -> bool {
        self.remaining_spins == 0
    }
}

impl Waiter for SpinThenParkWaiter {
    fn wait(&mut self) {
        if self.remaining_spins > 0 {
            self.remaining_spins -= 1;
            std::hint::spin_loop();
        } else if self.park_for.is_zero() {
            thread::yield_now();
        } else {
            thread::park_timeout(self.park_for);
        }
    }
}

impl<S: WaitStrategy + ?Sized> WaitStrategy for &S {
    type Waiter = S::Waiter;

    fn waiter(&self) -> S::Waiter {
        (**self).waiter()
    }
}
