//! Windowed Metrics Integration Tests
//!
//! Tests the windowed aggregators under a simulated clock, verifying:
//! - Window rolling and drain-once delivery
//! - Trailing window flush after finishing
//! - No lost or duplicated events when polled every window
//! - Concurrent recording from many threads
//! - Registry completion accounting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use geomq_loadgen::metrics::{
    Completion, MetricRegistry, SimulatedClock, WindowedAverager, WindowedCounter,
};
use geomq_loadgen::rng::DeterministicRng;

// ============================================================================
// Counter Tests
// ============================================================================

#[test]
fn test_counter_window_lifecycle() {
    let clock = SimulatedClock::from_secs(1_000);
    let counter = WindowedCounter::with_clock(clock.clone());

    // Fresh counter hands out an empty window first.
    assert_eq!(counter.poll_once(), Some(0));
    assert_eq!(counter.poll_once(), None);

    for _ in 0..5 {
        counter.record_event();
    }
    clock.advance_ms(1_000);
    counter.record_event();

    assert_eq!(counter.poll_once(), Some(5));
    assert_eq!(counter.poll_once(), None);

    counter.mark_finished();
    assert_eq!(counter.completion(), Completion::Finishing);
    assert_eq!(counter.poll_once(), Some(1));
    assert_eq!(counter.completion(), Completion::Drained);
    assert_eq!(counter.poll_once(), None);
}

#[test]
fn test_counter_drops_after_finish() {
    let clock = SimulatedClock::from_secs(5);
    let counter = WindowedCounter::with_clock(clock.clone());
    counter.mark_finished();
    counter.mark_finished();

    counter.record_event();
    clock.advance_ms(2_000);
    counter.record_event();

    assert_eq!(counter.dropped_events(), 2);
    assert_eq!(counter.poll_once(), Some(0));
    assert_eq!(counter.poll_once(), Some(0));
    assert_eq!(counter.poll_once(), None);
}

#[test]
fn test_counter_no_loss_many_seeds() {
    for seed in 0..200 {
        let mut rng = DeterministicRng::new(seed);
        let clock = SimulatedClock::from_secs(rng.gen_range(1, 1_000_000));
        let counter = WindowedCounter::with_clock(clock.clone());

        let mut total = 0u64;
        let mut polled = 0u64;
        let seconds = rng.gen_range(1, 30);
        for _ in 0..seconds {
            let events = rng.gen_range(0, 50);
            for _ in 0..events {
                counter.record_event();
            }
            total += events;

            // Clock may skip whole seconds.
            clock.advance_ms(1_000 * rng.gen_range(1, 4));
            if let Some(count) = counter.poll_once() {
                polled += count;
            }
        }

        counter.mark_finished();
        while let Some(count) = counter.poll_once() {
            polled += count;
        }
        assert_eq!(polled, total, "seed {}", seed);
        assert_eq!(counter.completion(), Completion::Drained, "seed {}", seed);
    }
}

#[test]
fn test_counter_concurrent_recording() {
    const THREADS: usize = 8;
    const EVENTS: usize = 10_000;

    let clock = SimulatedClock::from_secs(42);
    let counter = Arc::new(WindowedCounter::with_clock(clock.clone()));
    assert_eq!(counter.poll_once(), Some(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..EVENTS {
                    counter.record_event();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    counter.mark_finished();
    assert_eq!(counter.poll_once(), Some((THREADS * EVENTS) as u64));
    assert_eq!(counter.poll_once(), None);
}

#[test]
fn test_counter_poller_races_writers() {
    const THREADS: usize = 4;
    const EVENTS: u64 = 20_000;
    const MAX_ROLLS: usize = 50;

    let clock = SimulatedClock::from_secs(500);
    let counter = Arc::new(WindowedCounter::with_clock(clock.clone()));
    let done = Arc::new(AtomicBool::new(false));
    assert_eq!(counter.poll_once(), Some(0));

    let writers: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..EVENTS {
                    assert!(counter.record_event());
                }
            })
        })
        .collect();

    let poller = {
        let counter = Arc::clone(&counter);
        let clock = clock.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut polled = 0u64;
            for _ in 0..MAX_ROLLS {
                // Each advance allows one roll; read it before the next.
                clock.advance_ms(1_000);
                loop {
                    if let Some(count) = counter.poll_once() {
                        polled += count;
                        break;
                    }
                    if done.load(Ordering::Acquire) {
                        return polled;
                    }
                    thread::yield_now();
                }
                assert!(polled <= THREADS as u64 * EVENTS);
            }
            polled
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let mut polled = poller.join().unwrap();
    assert!(polled <= THREADS as u64 * EVENTS);

    counter.mark_finished();
    while let Some(count) = counter.poll_once() {
        polled += count;
    }
    assert_eq!(polled, THREADS as u64 * EVENTS);
    assert_eq!(counter.dropped_events(), 0);
}

// ============================================================================
// Averager Tests
// ============================================================================

#[test]
fn test_averager_truncating_mean() {
    let clock = SimulatedClock::from_secs(7);
    let avg = WindowedAverager::new("pub-a", clock.clone());
    avg.poll_once();

    for latency in [10, 11, 11] {
        avg.record_event(latency);
    }
    clock.advance_ms(1_000);
    avg.record_event(-4);

    let window = avg.poll_once().unwrap();
    assert_eq!(window.mean_ms, 10);
    assert_eq!(window.samples, 3);

    assert!(avg.mark_finished());
    assert!(!avg.mark_finished());
    let last = avg.poll_once().unwrap();
    assert_eq!(last.mean_ms, -4);
    assert_eq!(last.samples, 1);
    assert!(avg.poll_once().is_none());
}

#[test]
fn test_averager_samples_no_loss_many_seeds() {
    for seed in 0..200 {
        let mut rng = DeterministicRng::new(seed);
        let clock = SimulatedClock::from_secs(1_000);
        let avg = WindowedAverager::new("pub", clock.clone());

        let mut total = 0u64;
        let mut seen = 0u64;
        for _ in 0..rng.gen_range(1, 20) {
            let samples = rng.gen_range(0, 20);
            for _ in 0..samples {
                avg.record_event(rng.gen_range(0, 500) as i64);
            }
            total += samples;
            clock.advance_ms(1_000);
            if let Some(window) = avg.poll_once() {
                seen += window.samples;
            }
        }
        avg.mark_finished();
        while let Some(window) = avg.poll_once() {
            seen += window.samples;
        }
        assert_eq!(seen, total, "seed {}", seed);
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

#[test]
fn test_registry_concurrent_senders() {
    const THREADS: usize = 6;
    const SAMPLES: usize = 2_000;

    let clock = SimulatedClock::from_secs(9);
    let registry = Arc::new(MetricRegistry::with_clock(clock.clone()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                // Every thread writes its own id and one shared id.
                let own = format!("pub-{}", t);
                for i in 0..SAMPLES {
                    registry.record_for(&own, 10);
                    if i % 2 == 0 {
                        registry.record_for("shared", 20);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), THREADS + 1);
    assert_eq!(registry.live_entries(), THREADS + 1);

    // Initial empty windows first.
    let initial = registry.poll_all();
    assert_eq!(initial.len(), THREADS + 1);
    assert!(initial.iter().all(|r| r.samples == 0));

    registry.mark_all_finished();
    let reports = registry.poll_all();
    assert_eq!(reports.len(), THREADS + 1);
    for report in &reports {
        if report.key == "shared" {
            assert_eq!(report.samples, (THREADS * SAMPLES / 2) as u64);
            assert_eq!(report.mean_ms, 20);
        } else {
            assert_eq!(report.samples, SAMPLES as u64);
            assert_eq!(report.mean_ms, 10);
        }
    }
    assert!(registry.poll_all().is_empty());

    // The sweep does not count as individual completion.
    assert!(!registry.is_all_finished());
}

#[test]
fn test_registry_individual_completion() {
    let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
    assert!(!registry.is_all_finished());

    registry.record_for("a", 1);
    registry.record_for("b", 2);
    assert!(registry.mark_finished("a"));
    assert!(!registry.mark_finished("a"));
    assert!(!registry.is_all_finished());
    assert_eq!(registry.live_entries(), 1);

    assert!(registry.mark_finished("b"));
    assert!(registry.is_all_finished());

    // Late samples for a finished sender are dropped.
    registry.record_for("a", 3);
    let entry = registry.get("a").unwrap();
    assert_eq!(entry.dropped_events(), 1);
}

#[test]
fn test_registry_reports_sorted() {
    let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
    for key in ["zeta", "alpha", "mid"] {
        registry.record_for(key, 1);
    }
    let keys: Vec<String> = registry.poll_all().into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
}
