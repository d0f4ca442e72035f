//! Windowed latency averager
//!
//! Same drain contract as [`WindowedCounter`](super::WindowedCounter), but
//! each window accumulates a latency sum and sample count and reports the
//! truncated mean.

use parking_lot::Mutex;
use tracing::warn;

use super::clock::{Clock, SystemClock};
use super::window::{Completion, SumCount, Window};

/// Mean latency of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyWindow {
    /// Truncated mean in milliseconds, 0 for an empty window
    pub mean_ms: i64,
    /// Samples that went into the mean
    pub samples: u64,
}

impl LatencyWindow {
    fn from_acc(acc: SumCount) -> Self {
        LatencyWindow {
            mean_ms: acc.mean(),
            samples: acc.count,
        }
    }
}

/// Per-sender latency averager with drain-once reads
#[derive(Debug)]
pub struct WindowedAverager<C: Clock = SystemClock> {
    key: String,
    clock: C,
    window: Mutex<Window<SumCount>>,
}

impl<C: Clock> WindowedAverager<C> {
    pub fn new(key: impl Into<String>, clock: C) -> Self {
        let now = clock.now_secs();
        WindowedAverager {
            key: key.into(),
            clock,
            window: Mutex::new(Window::new(now)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Add one latency sample (milliseconds, may be negative under clock skew).
    #[inline]
    pub fn record_event(&self, latency_ms: i64) {
        let now = self.clock.now_secs();
        let accepted = self.window.lock().record(now, latency_ms);
        if !accepted {
            warn!(id = %self.key, "already finished, dropping latency sample");
        }
    }

    pub fn poll_once(&self) -> Option<LatencyWindow> {
        self.window.lock().poll().map(LatencyWindow::from_acc)
    }

    /// Returns `true` if this call moved the entry out of the active state.
    pub fn mark_finished(&self) -> bool {
        self.window.lock().finish()
    }

    pub fn is_finished(&self) -> bool {
        self.window.lock().is_finished()
    }

    pub fn completion(&self) -> Completion {
        self.window.lock().completion()
    }

    pub fn dropped_events(&self) -> u64 {
        self.window.lock().dropped()
    }

    /// Rewind accumulation and completion to the just-created state.
    pub fn reset(&self) {
        let now = self.clock.now_secs();
        self.window.lock().reset(now);
    }
}
