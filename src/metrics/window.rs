//! One-second windows with drain-once reads
//!
//! A window keeps the running accumulation for the current second and the
//! finalized value of the previous one. Only one completed value is ever
//! buffered: if the poller does not read it before the next roll it is
//! overwritten. Pollers must therefore poll at least once per window.
//!
//! ## Completion states
//!
//! ```text
//! Active --finish()--> Finishing --poll (in-flight)--> Drained
//! ```
//!
//! Once finishing, new samples are dropped and the trailing partial window
//! is handed out exactly once, after any unread completed value.

/// Lifecycle of a windowed metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Still accepting samples
    Active,
    /// Marked done, the final partial window is pending one read
    Finishing,
    /// Final value delivered, polls return nothing from now on
    Drained,
}

/// Which value a poll hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Nothing,
    Completed,
    InFlight,
}

/// Per-window accumulation
pub(crate) trait Accumulate: Default + Copy {
    type Sample;

    fn add(&mut self, sample: Self::Sample);
}

impl Accumulate for u64 {
    type Sample = ();

    #[inline]
    fn add(&mut self, _: ()) {
        *self = self.saturating_add(1);
    }
}

/// Running (sum, count) pair for averaging signed samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SumCount {
    pub sum: i64,
    pub count: u64,
}

impl SumCount {
    /// Truncating mean, zero for an empty window
    pub fn mean(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count as i64
        }
    }
}

impl Accumulate for SumCount {
    type Sample = i64;

    #[inline]
    fn add(&mut self, sample: i64) {
        self.sum = self.sum.saturating_add(sample);
        self.count += 1;
    }
}

/// Window state; callers guard it with their own lock.
#[derive(Debug)]
pub(crate) struct Window<A: Accumulate> {
    current_sec: u64,
    current: A,
    completed: A,
    completed_consumed: bool,
    completion: Completion,
    dropped: u64,
}

impl<A: Accumulate> Window<A> {
    pub fn new(now_sec: u64) -> Self {
        Window {
            current_sec: now_sec,
            current: A::default(),
            completed: A::default(),
            completed_consumed: false,
            completion: Completion::Active,
            dropped: 0,
        }
    }

    /// Add a sample to the window for `now_sec`.
    ///
    /// Returns `false` (and counts a drop) once the window is finished.
    pub fn record(&mut self, now_sec: u64, sample: A::Sample) -> bool {
        if self.completion != Completion::Active {
            self.dropped += 1;
            return false;
        }
        if now_sec != self.current_sec {
            self.completed = std::mem::take(&mut self.current);
            self.current_sec = now_sec;
            self.completed_consumed = false;
        }
        self.current.add(sample);
        true
    }

    pub fn poll(&mut self) -> Option<A> {
        match self.next_drain() {
            Drain::Nothing => None,
            Drain::Completed => Some(self.completed),
            Drain::InFlight => Some(self.current),
        }
    }

    fn next_drain(&mut self) -> Drain {
        match (self.completion, self.completed_consumed) {
            (Completion::Active, true) => Drain::Nothing,
            (Completion::Finishing, true) => {
                self.completion = Completion::Drained;
                Drain::InFlight
            }
            (Completion::Drained, true) => Drain::Nothing,
            (_, false) => {
                self.completed_consumed = true;
                Drain::Completed
            }
        }
    }

    /// Idempotent. Returns `true` on the transition out of `Active`.
    pub fn finish(&mut self) -> bool {
        if self.completion == Completion::Active {
            self.completion = Completion::Finishing;
            true
        } else {
            false
        }
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_finished(&self) -> bool {
        self.completion != Completion::Active
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Rewind to the just-created state.
    pub fn reset(&mut self, now_sec: u64) {
        *self = Window::new(now_sec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_window_yields_zero_once() {
        let mut w: Window<u64> = Window::new(0);
        assert_eq!(w.poll(), Some(0));
        assert_eq!(w.poll(), None);
    }

    #[test]
    fn test_roll_exposes_previous_second() {
        let mut w: Window<u64> = Window::new(0);
        w.poll();
        for _ in 0..3 {
            w.record(0, ());
        }
        assert_eq!(w.poll(), None);

        w.record(1, ());
        assert_eq!(w.poll(), Some(3));
        assert_eq!(w.poll(), None);
    }

    #[test]
    fn test_unread_value_is_overwritten() {
        let mut w: Window<u64> = Window::new(0);
        w.record(0, ());
        w.record(1, ());
        w.record(1, ());
        w.record(2, ());
        assert_eq!(w.poll(), Some(2));
    }

    #[test]
    fn test_finish_flushes_in_flight_once() {
        let mut w: Window<u64> = Window::new(0);
        w.record(0, ());
        w.record(1, ());
        w.record(1, ());
        assert!(w.finish());
        assert!(!w.finish());

        assert_eq!(w.poll(), Some(1));
        assert_eq!(w.completion(), Completion::Finishing);
        assert_eq!(w.poll(), Some(2));
        assert_eq!(w.completion(), Completion::Drained);
        for _ in 0..5 {
            assert_eq!(w.poll(), None);
        }
    }

    #[test]
    fn test_samples_after_finish_are_dropped() {
        let mut w: Window<u64> = Window::new(0);
        w.poll();
        w.finish();
        assert!(!w.record(0, ()));
        assert!(!w.record(5, ()));
        assert_eq!(w.dropped(), 2);
        assert_eq!(w.poll(), Some(0));
        assert_eq!(w.poll(), None);
    }

    #[test]
    fn test_sum_count_mean_truncates() {
        let mut w: Window<SumCount> = Window::new(0);
        w.poll();
        for sample in [10, 11, 11] {
            w.record(0, sample);
        }
        w.record(1, 0);
        let done = w.poll().unwrap();
        assert_eq!(done.count, 3);
        assert_eq!(done.mean(), 10);

        assert_eq!(SumCount::default().mean(), 0);
        assert_eq!(SumCount { sum: -7, count: 2 }.mean(), -3);
    }

    #[test]
    fn test_reset_reopens() {
        let mut w: Window<SumCount> = Window::new(0);
        w.record(0, 5);
        w.finish();
        w.poll();
        w.poll();
        w.reset(9);
        assert_eq!(w.completion(), Completion::Active);
        assert_eq!(w.dropped(), 0);
        assert_eq!(w.poll(), Some(SumCount::default()));
        assert!(w.record(9, 1));
    }
}
