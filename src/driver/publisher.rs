//! Publisher driver
//!
//! Spawns `routines` publishing tasks over the client connections. Each
//! task stamps a measurement with the current time, routes it by the
//! time-derived topic and counts it. A rate reporter drains the counter
//! once per window until the measurement time is up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{report_rate, route_for, DriverError, PID_LEN};
use crate::config::{ConfigError, PublisherConfig};
use crate::metrics::{Clock, WindowedCounter};
use crate::payload::{PayloadTemplate, SignalPayload, SIGNAL_TOPIC};
use crate::rng::DeterministicRng;
use crate::transport::{Route, Transport};

const NANOS_PER_MILLI: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSummary {
    pub pid: String,
    /// Per-window publish rates in delivery order
    pub windows: Vec<u64>,
    /// Messages published and counted in a window
    pub published: u64,
}

/// Run one publisher measurement.
///
/// `counter` must be fresh for this run. A topic that fails to decode in
/// location-aware mode, or a failed publish, stops the run and is
/// returned after the final flush.
pub async fn run_publisher<T, C>(
    config: &PublisherConfig,
    clients: Vec<T>,
    counter: Arc<WindowedCounter<C>>,
    clock: C,
    cancel: CancellationToken,
) -> Result<PublisherSummary, DriverError>
where
    T: Transport,
    C: Clock,
{
    config.validate()?;
    if clients.is_empty() {
        return Err(ConfigError::Invalid("no client connections".into()).into());
    }

    let seed = config.seed.unwrap_or_else(|| clock.now_nanos());
    let mut rng = DeterministicRng::new(seed);
    let pid = match &config.pid {
        Some(pid) if !pid.is_empty() => pid.clone(),
        _ => rng.alpha_string(PID_LEN),
    };
    let template = Arc::new(PayloadTemplate::new(
        pid.clone(),
        config.msglen,
        &rng.alpha_string(config.msglen),
    ));

    info!("OPTION Message length             : {}", config.msglen);
    info!("OPTION Client num                 : {}", clients.len());
    info!("OPTION Routine num                : {}", config.routines);
    info!("OPTION Measurement time           : {} [s]", config.duration_secs);
    info!("OPTION Publish interval           : {} [ms]", config.interval_ms);
    info!("OPTION Process prefix             : {:?}", config.prefix);
    info!("OPTION Location aware             : {}", config.location_aware);
    info!("OPTION Process id                 : {}", pid);
    info!("OPTION Seed                       : {}", seed);

    let clients: Vec<Arc<T>> = clients.into_iter().map(Arc::new).collect();
    let stop = cancel.child_token();

    let mut tasks = JoinSet::new();
    for i in 0..config.routines {
        let task = PublishTask {
            client: Arc::clone(&clients[i % clients.len()]),
            counter: Arc::clone(&counter),
            clock: clock.clone(),
            template: Arc::clone(&template),
            prefix: config.prefix.clone(),
            level: config.level,
            location_aware: config.location_aware,
            interval: config.interval(),
            stop: stop.clone(),
        };
        tasks.spawn(task.run());
    }
    info!("Launched {} publishing tasks", config.routines);

    let windows = report_rate(&counter, &clock, config, &stop).await;
    stop.cancel();

    let mut published = 0;
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(sent)) => published += sent,
            Ok(Err(e)) => {
                failure.get_or_insert(e);
            }
            Err(e) => {
                failure.get_or_insert(e.into());
            }
        }
    }

    if !config.location_aware && failure.is_none() {
        send_done_signal(clients[0].as_ref(), &pid, clock.now_millis()).await;
    }

    for (i, client) in clients.iter().enumerate() {
        client.disconnect().await;
        info!("Disconnecting... ({})", i);
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(PublisherSummary {
            pid,
            windows,
            published,
        }),
    }
}

async fn send_done_signal<T: Transport>(client: &T, pid: &str, time_ms: u64) {
    let route = Route::Topic(SIGNAL_TOPIC.to_string());
    let result = match SignalPayload::done(pid, time_ms).encode() {
        Ok(payload) => client.publish(&route, payload).await.map_err(DriverError::from),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        warn!("Publish error (done signal): {}", e);
    }
}

struct PublishTask<T, C: Clock> {
    client: Arc<T>,
    counter: Arc<WindowedCounter<C>>,
    clock: C,
    template: Arc<PayloadTemplate>,
    prefix: String,
    level: usize,
    location_aware: bool,
    interval: Duration,
    stop: CancellationToken,
}

impl<T: Transport, C: Clock> PublishTask<T, C> {
    async fn run(self) -> Result<u64, DriverError> {
        let mut sent = 0;
        while !self.counter.is_finished() && !self.stop.is_cancelled() {
            if let Err(e) = self.publish_once().await {
                warn!("Publish failed: {}", e);
                self.stop.cancel();
                return Err(e);
            }
            if self.counter.record_event() {
                sent += 1;
            }

            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        Ok(sent)
    }

    async fn publish_once(&self) -> Result<(), DriverError> {
        let now = self.clock.now_nanos();
        let route = route_for(&self.prefix, now, self.level, self.location_aware)?;
        let payload = self.template.measurement(now / NANOS_PER_MILLI).encode()?;
        self.client.publish(&route, payload).await?;
        Ok(())
    }
}
