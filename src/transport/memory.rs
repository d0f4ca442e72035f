//! In-process broker for tests and loopback runs

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::debug;

use super::{Delivery, DeliveryReceiver, Route, Subscription, Transport, TransportError};

/// MQTT-style filter match
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

struct Subscriber {
    client: u64,
    subscription: Subscription,
    sender: UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BrokerInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_client: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
}

/// Shared hub that [`InMemoryTransport`] clients connect to
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> InMemoryTransport {
        InMemoryTransport {
            broker: self.clone(),
            client: self.inner.next_client.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
        }
    }

    /// Open `n` client connections
    pub fn connect_many(&self, n: usize) -> Vec<InMemoryTransport> {
        (0..n).map(|_| self.connect()).collect()
    }

    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    fn route(&self, route: &Route, payload: Bytes) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut stale = false;
        {
            let subscribers = self.inner.subscribers.read();
            for sub in subscribers.iter().filter(|s| s.subscription.matches(route)) {
                let delivery = Delivery {
                    route: route.clone(),
                    payload: payload.clone(),
                };
                if sub.sender.send(delivery).is_ok() {
                    self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                } else {
                    stale = true;
                }
            }
        }
        if stale {
            self.inner
                .subscribers
                .write()
                .retain(|s| !s.sender.is_closed());
        }
    }
}

/// One client connection to an [`InMemoryBroker`]
pub struct InMemoryTransport {
    broker: InMemoryBroker,
    client: u64,
    closed: AtomicBool,
}

impl InMemoryTransport {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for InMemoryTransport {
    fn publish<'a>(
        &'a self,
        route: &'a Route,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_open()?;
            self.broker.route(route, payload);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        subscription: Subscription,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryReceiver, TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_open()?;
            let (sender, receiver) = unbounded_channel();
            debug!(client = self.client, ?subscription, "subscribed");
            self.broker.inner.subscribers.write().push(Subscriber {
                client: self.client,
                subscription,
                sender,
            });
            Ok(receiver)
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.broker
                .inner
                .subscribers
                .write()
                .retain(|s| s.client != self.client);
            debug!(client = self.client, "disconnected");
        })
    }
}
