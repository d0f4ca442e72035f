//! Logging Configuration
//!
//! All settings are loaded from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | LOADGEN_LOG | info | `EnvFilter` directives |
//! | LOADGEN_LOG_JSON | false | Emit JSON lines instead of text |
//! | LOADGEN_SERVICE | geomq-loadgen | Service name stamped on startup |

/// Logging configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives, e.g. `info` or `geomq_loadgen::driver=debug`
    pub filter: String,
    /// JSON output for log shippers
    pub json: bool,
    pub service_name: String,
    pub version: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
            json: false,
            service_name: "geomq-loadgen".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = LogConfig::default();
        LogConfig {
            filter: lookup("LOADGEN_LOG")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.filter),
            json: lookup("LOADGEN_LOG_JSON")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.json),
            service_name: lookup("LOADGEN_SERVICE").unwrap_or(defaults.service_name),
            version: defaults.version,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
