//! Clock Abstraction for Windowed Metrics
//!
//! Windows are one wall-clock second wide, so every windowed type reads
//! time through this trait. Production code uses the system clock; tests
//! drive a simulated clock to roll windows deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Source of the current 64-bit nanosecond timestamp
pub trait Clock: Send + Sync + Clone + 'static {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> u64;

    fn now_millis(&self) -> u64 {
        self.now_nanos() / NANOS_PER_MILLI
    }

    /// Identity of the current one-second window
    fn now_secs(&self) -> u64 {
        self.now_nanos() / NANOS_PER_SEC
    }

    fn elapsed_since(&self, since_nanos: u64) -> Duration {
        Duration::from_nanos(self.now_nanos().saturating_sub(since_nanos))
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance()` or `set()`.
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    time_ns: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    pub fn new(start_ns: u64) -> Self {
        SimulatedClock {
            time_ns: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(secs * NANOS_PER_SEC)
    }

    pub fn advance(&self, duration: Duration) {
        self.time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.time_ns.fetch_add(ms * NANOS_PER_MILLI, Ordering::SeqCst);
    }

    pub fn set(&self, time_ns: u64) {
        self.time_ns.store(time_ns, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now_nanos(&self) -> u64 {
        self.time_ns.load(Ordering::SeqCst)
    }
}
