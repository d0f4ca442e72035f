//! Windowed Metrics Aggregation
//!
//! Concurrently written, single-reader drained aggregators:
//!
//! - **WindowedCounter** counts events per one-second window (publish rate)
//! - **WindowedAverager** averages latency samples per window
//! - **MetricRegistry** keys averagers by sender id
//!
//! Every aggregator hands each completed window to the poller at most once
//! and flushes the trailing partial window exactly once after finishing.

mod averager;
mod clock;
mod counter;
mod registry;
mod window;

pub use averager::{LatencyWindow, WindowedAverager};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use counter::WindowedCounter;
pub use registry::{MetricRegistry, WindowReport};
pub use window::Completion;
