//! Observability
//!
//! Structured logging through `tracing`. The drivers emit their rate and
//! average lines at `info`; per-topic details are at `debug`.

mod config;

pub use config::LogConfig;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`.
///
/// Returns an error if the filter directives do not parse or a global
/// subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }
    tracing::info!(
        service = %config.service_name,
        version = %config.version,
        "logging initialized"
    );
    Ok(())
}
