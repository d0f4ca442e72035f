//! Configuration for publisher and subscriber drivers
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! [publisher]
//! routines = 10
//! interval_ms = 50
//! location_aware = true
//! prefix = "/0"
//!
//! [subscriber]
//! wait_secs = 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geocell::{prefix_depth, MAX_LEVELS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Publisher driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Sender id embedded in every message (random when unset)
    pub pid: Option<String>,
    /// Target encoded message length in bytes
    pub msglen: usize,
    /// Client connections
    pub clients: usize,
    /// Publishing tasks, spread round-robin over the clients
    pub routines: usize,
    /// Measurement time
    pub duration_secs: u64,
    /// Sleep after each publish
    pub interval_ms: u64,
    /// Seed for pid and padding (current time when unset)
    pub seed: Option<u64>,
    /// Leading topic segments already known to the routing scope
    pub prefix: String,
    /// Topic depth including the prefix
    pub level: usize,
    /// Route by cell token instead of topic path
    pub location_aware: bool,
    /// Rate reporter cadence, must not exceed one second
    pub poll_interval_ms: u64,
    /// Extra polls after finishing
    pub flush_polls: usize,
    pub flush_interval_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig {
            pid: None,
            msglen: 100,
            clients: 100,
            routines: 100,
            duration_secs: 100,
            interval_ms: 100,
            seed: None,
            prefix: String::new(),
            level: MAX_LEVELS,
            location_aware: false,
            poll_interval_ms: 300,
            flush_polls: 5,
            flush_interval_ms: 500,
        }
    }
}

impl PublisherConfig {
    /// Short timings for tests
    pub fn test() -> Self {
        PublisherConfig {
            pid: Some("testpub".to_string()),
            clients: 2,
            routines: 4,
            duration_secs: 1,
            interval_ms: 5,
            seed: Some(7),
            poll_interval_ms: 100,
            flush_polls: 3,
            flush_interval_ms: 50,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients == 0 {
            return Err(ConfigError::Invalid("clients must be at least 1".into()));
        }
        if self.routines == 0 {
            return Err(ConfigError::Invalid("routines must be at least 1".into()));
        }
        validate_level("level", self.level, &self.prefix)?;
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 1000 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be within 1..=1000 or windows are lost".into(),
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Subscriber driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Client connections
    pub clients: usize,
    /// Grace period after a done signal, and idle time before stopping
    pub wait_secs: u64,
    /// Topic scope to listen under
    pub prefix: String,
    /// Subscribe by cell token instead of topic filter
    pub location_aware: bool,
    /// Depth of the subscribed cell when location-aware
    pub subscribe_level: usize,
    /// Average reporter cadence, must not exceed one second
    pub poll_interval_ms: u64,
    /// Pause between the final sweep and the last poll
    pub flush_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        SubscriberConfig {
            clients: 1,
            wait_secs: 1,
            prefix: String::new(),
            location_aware: false,
            subscribe_level: 8,
            poll_interval_ms: 500,
            flush_delay_ms: 1000,
        }
    }
}

impl SubscriberConfig {
    pub fn test() -> Self {
        SubscriberConfig {
            wait_secs: 1,
            poll_interval_ms: 100,
            flush_delay_ms: 50,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients == 0 {
            return Err(ConfigError::Invalid("clients must be at least 1".into()));
        }
        if self.location_aware {
            validate_level("subscribe_level", self.subscribe_level, &self.prefix)?;
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 1000 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be within 1..=1000 or windows are lost".into(),
            ));
        }
        Ok(())
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

fn validate_level(name: &str, level: usize, prefix: &str) -> Result<(), ConfigError> {
    if level == 0 || level > MAX_LEVELS {
        return Err(ConfigError::Invalid(format!(
            "{name} must be within 1..={MAX_LEVELS}, got {level}"
        )));
    }
    let depth = prefix_depth(prefix);
    if depth > level {
        return Err(ConfigError::Invalid(format!(
            "prefix {prefix:?} is deeper ({depth}) than {name} ({level})"
        )));
    }
    Ok(())
}

/// Settings for an in-process publisher/subscriber run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub publisher: PublisherConfig,
    pub subscriber: SubscriberConfig,
}

impl LoopbackConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.publisher.validate()?;
        self.subscriber.validate()
    }
}
