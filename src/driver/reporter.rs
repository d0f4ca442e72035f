//! Background pollers that drain aggregators and log the figures

use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{PublisherConfig, SubscriberConfig};
use crate::metrics::{Clock, MetricRegistry, WindowReport, WindowedCounter};

/// Poll the publish counter for the measurement time, then finish it and
/// flush the trailing window.
///
/// Returns every rate that was delivered, in order.
pub async fn report_rate<C: Clock>(
    counter: &WindowedCounter<C>,
    clock: &C,
    config: &PublisherConfig,
    stop: &CancellationToken,
) -> Vec<u64> {
    let mut rates = Vec::new();
    let start = clock.now_nanos();
    let mut ticker = interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while clock.elapsed_since(start) < config.duration() {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if let Some(rate) = counter.poll_once() {
            info!("Publish rate: {} [pub/s]", rate);
            rates.push(rate);
        }
    }

    counter.mark_finished();
    for _ in 0..config.flush_polls {
        if let Some(rate) = counter.poll_once() {
            info!("Publish rate: {} [pub/s]", rate);
            rates.push(rate);
        }
        sleep(config.flush_interval()).await;
    }
    // A finished counter drains in at most two polls.
    while let Some(rate) = counter.poll_once() {
        info!("Publish rate: {} [pub/s]", rate);
        rates.push(rate);
    }
    rates
}

/// Poll the registry until it goes idle, every sender is finished, or the
/// run is cancelled; then sweep everything finished and drain what is left.
///
/// Idle time is counted in whole seconds since the last delivered window
/// and only once the first sender has been seen. Windows roll once a
/// second, so anything finer would trip between two rolls.
pub async fn report_averages<C: Clock>(
    registry: &MetricRegistry<C>,
    clock: &C,
    config: &SubscriberConfig,
    stop: &CancellationToken,
) -> Vec<WindowReport> {
    let mut reports = Vec::new();
    let mut last_activity = clock.now_secs();

    loop {
        let batch = registry.poll_all();
        if batch.is_empty() {
            let idle_secs = clock.now_secs().saturating_sub(last_activity);
            let idle = !registry.is_empty() && idle_secs > config.wait_secs;
            if idle || registry.is_all_finished() || stop.is_cancelled() {
                registry.mark_all_finished();
                break;
            }
        } else {
            log_averages(&batch);
            reports.extend(batch);
            last_activity = clock.now_secs();
        }

        tokio::select! {
            _ = stop.cancelled() => {}
            _ = sleep(config.poll_interval()) => {}
        }
    }

    sleep(config.flush_delay()).await;
    reports.extend(drain_finished(registry));
    reports
}

/// Poll until every swept entry has handed out its trailing window.
///
/// A writer may roll an entry between the last empty poll and the sweep,
/// leaving both a completed and an in-flight value to read.
fn drain_finished<C: Clock>(registry: &MetricRegistry<C>) -> Vec<WindowReport> {
    let mut reports = Vec::new();
    loop {
        let batch = registry.poll_all();
        if batch.is_empty() {
            return reports;
        }
        log_averages(&batch);
        reports.extend(batch);
    }
}

fn log_averages(batch: &[WindowReport]) {
    for report in batch {
        info!(
            "Average : {} [ms] [n={}] (ID: {})",
            report.mean_ms, report.samples, report.key
        );
    }
}
