//! In-process publisher and subscriber sharing one broker

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    run_publisher, run_subscriber, subscriptions_for, DriverError, PublisherSummary,
    SubscriberSummary,
};
use crate::config::LoopbackConfig;
use crate::metrics::{Clock, MetricRegistry, WindowedCounter};
use crate::transport::InMemoryBroker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackSummary {
    pub publisher: PublisherSummary,
    pub subscriber: SubscriberSummary,
    /// Messages the broker handed to subscribers
    pub delivered: u64,
}

/// Run a publisher against a subscriber over an [`InMemoryBroker`].
///
/// The subscriber is started and subscribed before the first publish.
pub async fn run_loopback<C: Clock>(
    config: &LoopbackConfig,
    clock: C,
    cancel: CancellationToken,
) -> Result<LoopbackSummary, DriverError> {
    config.validate()?;

    let broker = InMemoryBroker::new();
    let subscribers = broker.connect_many(config.subscriber.clients);
    let publishers = broker.connect_many(config.publisher.clients);

    let registry = Arc::new(MetricRegistry::with_clock(clock.clone()));
    let counter = Arc::new(WindowedCounter::with_clock(clock.clone()));

    let expected = config.subscriber.clients * subscriptions_for(&config.subscriber, &clock)?.len();
    let subscriber = {
        let config = config.subscriber.clone();
        let clock = clock.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_subscriber(&config, subscribers, registry, clock, cancel).await
        })
    };

    while broker.subscription_count() < expected {
        if subscriber.is_finished() {
            break;
        }
        tokio::task::yield_now().await;
    }
    info!(
        "Loopback broker ready ({} subscriptions)",
        broker.subscription_count()
    );

    let publisher = run_publisher(&config.publisher, publishers, counter, clock, cancel).await;
    let subscriber = subscriber.await??;
    let publisher = publisher?;

    Ok(LoopbackSummary {
        publisher,
        subscriber,
        delivered: broker.delivered(),
    })
}

