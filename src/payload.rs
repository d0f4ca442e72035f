//! Application payloads exchanged between publishers and subscribers
//!
//! Measurement messages carry the sender id and send time so subscribers
//! can compute end-to-end latency; padding brings each message up to the
//! configured length. Signal messages announce that a publisher is done.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Topic that carries [`SignalPayload`] messages
pub const SIGNAL_TOPIC: &str = "/signal";

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("payload decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    pub id: String,
    pub time_ms: u64,
    #[serde(default)]
    pub padding: String,
}

impl MeasurementPayload {
    pub fn encode(&self) -> Result<Bytes, PayloadError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(PayloadError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(data).map_err(PayloadError::Decode)
    }

    /// Latency observed at `receive_ms`; negative under clock skew
    pub fn latency_ms(&self, receive_ms: u64) -> i64 {
        receive_ms as i64 - self.time_ms as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub id: String,
    pub time_ms: u64,
    #[serde(default)]
    pub is_done: bool,
}

impl SignalPayload {
    pub fn done(id: impl Into<String>, time_ms: u64) -> Self {
        SignalPayload {
            id: id.into(),
            time_ms,
            is_done: true,
        }
    }

    pub fn encode(&self) -> Result<Bytes, PayloadError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(PayloadError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(data).map_err(PayloadError::Decode)
    }
}

/// Builds measurement messages of roughly `msglen` bytes for one sender.
#[derive(Debug, Clone)]
pub struct PayloadTemplate {
    id: String,
    padding: String,
}

impl PayloadTemplate {
    /// Size the padding against an encoded message with empty padding.
    ///
    /// `padding_source` must be at least `msglen` bytes of ASCII; the
    /// template keeps as much of it as fits.
    pub fn new(id: impl Into<String>, msglen: usize, padding_source: &str) -> Self {
        let id = id.into();
        let probe = MeasurementPayload {
            id: id.clone(),
            time_ms: 0,
            padding: String::new(),
        };
        let base = serde_json::to_string(&probe).map(|s| s.len()).unwrap_or(0);
        let wanted = msglen.saturating_sub(base).min(padding_source.len());
        let padding = padding_source
            .get(..wanted)
            .unwrap_or_default()
            .to_string();
        PayloadTemplate { id, padding }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn padding_len(&self) -> usize {
        self.padding.len()
    }

    pub fn measurement(&self, time_ms: u64) -> MeasurementPayload {
        MeasurementPayload {
            id: self.id.clone(),
            time_ms,
            padding: self.padding.clone(),
        }
    }
}
