pub mod config;
pub mod driver;
pub mod geocell;
pub mod metrics;
pub mod observability;
pub mod payload;
pub mod rng;
pub mod transport;

pub use config::{LoopbackConfig, PublisherConfig, SubscriberConfig};
pub use driver::{run_loopback, run_publisher, run_subscriber, DriverError};
pub use geocell::{build_topic, decode_topic, CellToken, CodecError};
pub use metrics::{MetricRegistry, WindowedAverager, WindowedCounter};
pub use transport::{InMemoryBroker, Route, Subscription, Transport};
