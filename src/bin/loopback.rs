//! Loopback Load Generator
//!
//! Runs a publisher and a subscriber against an in-process broker and
//! prints the measured publish rates and per-sender latency averages.
//!
//! Settings come from an optional TOML file (see `geomq_loadgen::config`),
//! overridden by command-line flags. Logging is configured from
//! `LOADGEN_LOG` and `LOADGEN_LOG_JSON`.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::Parser;
use geomq_loadgen::metrics::SystemClock;
use geomq_loadgen::observability::{init_tracing, LogConfig};
use geomq_loadgen::{run_loopback, LoopbackConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "loopback")]
#[command(about = "Publish and subscribe geocell topics through an in-process broker")]
struct Cli {
    /// TOML file with [publisher] and [subscriber] tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Publishing tasks
    #[arg(short = 'r', long)]
    routines: Option<usize>,

    /// Publisher client connections
    #[arg(short = 'n', long)]
    clients: Option<usize>,

    /// Measurement time in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Sleep after each publish in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Encoded message length in bytes
    #[arg(short = 'l', long)]
    msglen: Option<usize>,

    /// Topic prefix shared by publisher and subscriber
    #[arg(short, long)]
    prefix: Option<String>,

    /// Route by cell token instead of topic path
    #[arg(long)]
    location_aware: bool,

    /// Seed for the process id and padding
    #[arg(long)]
    seed: Option<u64>,

    /// Subscriber grace period in seconds
    #[arg(short, long)]
    wait: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut LoopbackConfig) {
        let publisher = &mut config.publisher;
        if let Some(routines) = self.routines {
            publisher.routines = routines;
        }
        if let Some(clients) = self.clients {
            publisher.clients = clients;
        }
        if let Some(duration) = self.duration {
            publisher.duration_secs = duration;
        }
        if let Some(interval) = self.interval {
            publisher.interval_ms = interval;
        }
        if let Some(msglen) = self.msglen {
            publisher.msglen = msglen;
        }
        if self.seed.is_some() {
            publisher.seed = self.seed;
        }
        if let Some(prefix) = &self.prefix {
            publisher.prefix = prefix.clone();
            config.subscriber.prefix = prefix.clone();
        }
        if self.location_aware {
            config.publisher.location_aware = true;
            config.subscriber.location_aware = true;
        }
        if let Some(wait) = self.wait {
            config.subscriber.wait_secs = wait;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(&LogConfig::from_env())?;

    let mut config = match &cli.config {
        Some(path) => LoopbackConfig::from_file(path)?,
        None => LoopbackConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, flushing...");
                cancel.cancel();
            }
        });
    }

    let summary = run_loopback(&config, SystemClock, cancel).await?;

    println!();
    println!("Loopback Summary");
    println!("================");
    println!("Process id:      {}", summary.publisher.pid);
    println!("Published:       {}", summary.publisher.published);
    println!("Delivered:       {}", summary.delivered);
    println!("Rate windows:    {}", summary.publisher.windows.len());
    println!("Senders seen:    {}", summary.subscriber.senders);
    for report in &summary.subscriber.reports {
        println!(
            "  {} mean {} [ms] over {} samples",
            report.key, report.mean_ms, report.samples
        );
    }
    info!("Done");
    Ok(())
}
