//! Transport Abstraction
//!
//! The load generator does not speak to a broker itself. Drivers publish
//! and subscribe through this trait; the concrete broker connection lives
//! outside the crate.
//!
//! Implementations:
//! - `InMemoryTransport`: process-local fan-out for tests and loopback runs
//!
//! Location-aware transports receive [`Route::Cell`] and resolve the cell
//! token to coordinates on their side.

mod memory;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::geocell::CellToken;

pub use memory::{topic_matches, InMemoryBroker, InMemoryTransport};

/// Where a message is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Plain topic path
    Topic(String),
    /// Cell token for location-aware routing
    Cell(CellToken),
}

/// What a client listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Topic filter, `+` matches one level and `#` the rest
    Filter(String),
    /// Every cell routed inside this cell
    Cell(CellToken),
}

impl Subscription {
    pub fn matches(&self, route: &Route) -> bool {
        match (self, route) {
            (Subscription::Filter(filter), Route::Topic(topic)) => topic_matches(filter, topic),
            (Subscription::Cell(area), Route::Cell(cell)) => area.contains(cell),
            _ => false,
        }
    }
}

/// A message handed to a subscriber
#[derive(Debug, Clone)]
pub struct Delivery {
    pub route: Route,
    pub payload: Bytes,
}

pub type DeliveryReceiver = UnboundedReceiver<Delivery>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport connection is closed")]
    Closed,
}

/// Publish/subscribe client connection
pub trait Transport: Send + Sync + 'static {
    fn publish<'a>(
        &'a self,
        route: &'a Route,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Start receiving deliveries that match `subscription`.
    ///
    /// The receiver ends when the connection is closed.
    fn subscribe(
        &self,
        subscription: Subscription,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryReceiver, TransportError>> + Send + '_>>;

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
