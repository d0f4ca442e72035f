//! Subscriber driver
//!
//! Every client subscribes to the publishers' topic scope (or cell) and
//! feeds end-to-end latency into the per-sender registry. Done signals
//! finish a sender after a grace period. An average reporter drains the
//! registry until the senders are finished or traffic stops.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{report_averages, DriverError};
use crate::config::{ConfigError, SubscriberConfig};
use crate::geocell::{build_topic, decode_topic};
use crate::metrics::{Clock, MetricRegistry, WindowReport};
use crate::payload::{MeasurementPayload, SignalPayload, SIGNAL_TOPIC};
use crate::transport::{Delivery, DeliveryReceiver, Route, Subscription, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberSummary {
    /// Every drained window, in delivery order
    pub reports: Vec<WindowReport>,
    /// Distinct senders seen
    pub senders: usize,
}

/// Subscriptions each client opens.
///
/// Plain mode listens under the prefix (the four top-level faces a
/// timestamp can produce when there is none) plus the signal topic.
/// Location-aware mode listens to the cell of the current time at
/// `subscribe_level`.
pub fn subscriptions_for<C: Clock>(
    config: &SubscriberConfig,
    clock: &C,
) -> Result<Vec<Subscription>, DriverError> {
    if config.location_aware {
        let topic = build_topic(&config.prefix, clock.now_nanos(), config.subscribe_level);
        return Ok(vec![Subscription::Cell(decode_topic(&topic)?)]);
    }

    let mut subs: Vec<Subscription> = if config.prefix.is_empty() {
        (0..4)
            .map(|face| Subscription::Filter(format!("/{}/#", face)))
            .collect()
    } else {
        vec![Subscription::Filter(format!(
            "{}/#",
            config.prefix.trim_end_matches('/')
        ))]
    };
    subs.push(Subscription::Filter(SIGNAL_TOPIC.to_string()));
    Ok(subs)
}

/// Run one subscriber measurement.
///
/// `registry` must be fresh for this run.
pub async fn run_subscriber<T, C>(
    config: &SubscriberConfig,
    clients: Vec<T>,
    registry: Arc<MetricRegistry<C>>,
    clock: C,
    cancel: CancellationToken,
) -> Result<SubscriberSummary, DriverError>
where
    T: Transport,
    C: Clock,
{
    config.validate()?;
    if clients.is_empty() {
        return Err(ConfigError::Invalid("no client connections".into()).into());
    }

    info!("OPTION Client num                 : {}", clients.len());
    info!("OPTION Wait time                  : {} [sec]", config.wait_secs);
    info!("OPTION Process prefix             : {:?}", config.prefix);
    info!("OPTION Location aware             : {}", config.location_aware);

    let subscriptions = subscriptions_for(config, &clock)?;
    let stop = cancel.child_token();
    let mut consumers = JoinSet::new();

    for client in &clients {
        for subscription in &subscriptions {
            let deliveries = client.subscribe(subscription.clone()).await?;
            let consumer = Consumer {
                registry: Arc::clone(&registry),
                clock: clock.clone(),
                wait: config.wait(),
                stop: stop.clone(),
            };
            consumers.spawn(consumer.run(deliveries));
        }
    }
    info!("Subscribed {} clients", clients.len());

    let reports = report_averages(&registry, &clock, config, &stop).await;
    stop.cancel();
    while let Some(joined) = consumers.join_next().await {
        joined?;
    }

    for (i, client) in clients.iter().enumerate() {
        client.disconnect().await;
        info!("Disconnecting... ({})", i);
    }

    Ok(SubscriberSummary {
        reports,
        senders: registry.len(),
    })
}

struct Consumer<C: Clock> {
    registry: Arc<MetricRegistry<C>>,
    clock: C,
    wait: Duration,
    stop: CancellationToken,
}

impl<C: Clock> Consumer<C> {
    async fn run(self, mut deliveries: DeliveryReceiver) {
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                delivery = deliveries.recv() => match delivery {
                    Some(delivery) => self.handle(delivery),
                    None => break,
                },
            }
        }
    }

    fn handle(&self, delivery: Delivery) {
        if matches!(&delivery.route, Route::Topic(topic) if topic == SIGNAL_TOPIC) {
            self.handle_signal(&delivery.payload);
            return;
        }

        match MeasurementPayload::decode(&delivery.payload) {
            Ok(payload) => {
                let latency = payload.latency_ms(self.clock.now_millis());
                self.registry.record_for(&payload.id, latency);
            }
            Err(e) => warn!("Dropping measurement: {}", e),
        }
    }

    fn handle_signal(&self, payload: &[u8]) {
        let signal = match SignalPayload::decode(payload) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Dropping signal: {}", e);
                return;
            }
        };
        let entry = self.registry.get_or_create(&signal.id);
        if !signal.is_done || entry.is_finished() {
            return;
        }

        info!("Waiting {} seconds... (ID: {})", self.wait.as_secs(), signal.id);
        let registry = Arc::clone(&self.registry);
        let wait = self.wait;
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(wait) => {
                    registry.mark_finished(&signal.id);
                }
            }
        });
    }
}
