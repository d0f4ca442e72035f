//! Windowed event counter
//!
//! Many writers call [`WindowedCounter::record_event`]; a single poller
//! drains one completed second at a time with
//! [`WindowedCounter::poll_once`]. The lock is held only for O(1)
//! bookkeeping.

use parking_lot::Mutex;
use tracing::warn;

use super::clock::{Clock, SystemClock};
use super::window::{Completion, Window};

/// Per-second event counter with drain-once reads
#[derive(Debug)]
pub struct WindowedCounter<C: Clock = SystemClock> {
    clock: C,
    window: Mutex<Window<u64>>,
}

impl Default for WindowedCounter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowedCounter<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> WindowedCounter<C> {
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now_secs();
        WindowedCounter {
            clock,
            window: Mutex::new(Window::new(now)),
        }
    }

    /// Count one event in the current second.
    ///
    /// Returns `false` once the counter is finished; the event is dropped
    /// and logged.
    #[inline]
    pub fn record_event(&self) -> bool {
        let now = self.clock.now_secs();
        let accepted = self.window.lock().record(now, ());
        if !accepted {
            warn!("counter already finished, dropping event");
        }
        accepted
    }

    /// Take the last completed second's count, at most once per window.
    ///
    /// After [`mark_finished`](Self::mark_finished) exactly one further
    /// successful poll returns the trailing partial count; every poll
    /// after that returns `None`.
    pub fn poll_once(&self) -> Option<u64> {
        self.window.lock().poll()
    }

    pub fn mark_finished(&self) {
        self.window.lock().finish();
    }

    pub fn is_finished(&self) -> bool {
        self.window.lock().is_finished()
    }

    pub fn completion(&self) -> Completion {
        self.window.lock().completion()
    }

    /// Events discarded because they arrived after finishing
    pub fn dropped_events(&self) -> u64 {
        self.window.lock().dropped()
    }
}
