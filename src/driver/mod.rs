//! Measurement drivers
//!
//! The plain and location-aware variants of the publisher and subscriber
//! share one implementation; they differ only in how a topic is routed:
//!
//! ```text
//! clock ─► build_topic ─┬─► Route::Topic(path)            (plain)
//!                       └─► decode_topic ─► Route::Cell    (location-aware)
//! ```
//!
//! Callers construct the aggregators for a run and inject them, so several
//! runs can coexist in one process.

mod loopback;
mod publisher;
mod reporter;
mod subscriber;

pub use loopback::{run_loopback, LoopbackSummary};
pub use publisher::{run_publisher, PublisherSummary};
pub use reporter::{report_averages, report_rate};
pub use subscriber::{run_subscriber, subscriptions_for, SubscriberSummary};

use tracing::debug;

use crate::config::ConfigError;
use crate::geocell::{build_topic, decode_topic, CodecError};
use crate::payload::PayloadError;
use crate::transport::{Route, TransportError};

/// Length of generated process ids
pub const PID_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("topic translation failed: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Route for `value` under `prefix` at `level`.
pub fn route_for(
    prefix: &str,
    value: u64,
    level: usize,
    location_aware: bool,
) -> Result<Route, CodecError> {
    let topic = build_topic(prefix, value, level);
    debug!(%topic, "built topic");
    if location_aware {
        Ok(Route::Cell(decode_topic(&topic)?))
    } else {
        Ok(Route::Topic(topic))
    }
}
