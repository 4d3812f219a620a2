use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::metrics::Sample;

/// Naive timestamps (no offset) are taken as UTC.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A sample as the server sends it. Unknown fields such as `id` or
/// `ts_local` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WireSample {
    pub ts: String,
    pub success: WireFlag,
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum WireFlag {
    Bool(bool),
    Int(i64),
}

impl WireFlag {
    fn as_bool(self) -> Option<bool> {
        match self {
            WireFlag::Bool(value) => Some(value),
            WireFlag::Int(0) => Some(false),
            WireFlag::Int(1) => Some(true),
            WireFlag::Int(_) => None,
        }
    }
}

impl WireSample {
    /// Validates the wire record into a [`Sample`].
    ///
    /// # Errors
    ///
    /// Returns `MalformedSample` for an unparseable timestamp, a success
    /// flag other than a bool/0/1, or a negative or non-finite latency.
    pub fn into_sample(self) -> Result<Sample, TransportError> {
        let timestamp = parse_timestamp(&self.ts)?;
        let success = self
            .success
            .as_bool()
            .ok_or_else(|| TransportError::MalformedSample {
                reason: format!("success flag {:?} is not a boolean", self.success),
            })?;
        if let Some(latency) = self.latency_ms
            && (!latency.is_finite() || latency < 0.0)
        {
            return Err(TransportError::MalformedSample {
                reason: format!("latency {} is not a valid duration", latency),
            });
        }
        Ok(Sample::new(timestamp, success, self.latency_ms))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TransportError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, NAIVE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| TransportError::MalformedSample {
            reason: format!("timestamp '{}' is invalid: {}", value, err),
        })
}

/// Decodes one JSON object into a sample.
///
/// # Errors
///
/// Returns `MalformedSample` when the payload is not a valid sample.
pub fn parse_sample_json(payload: &str) -> Result<Sample, TransportError> {
    let wire: WireSample =
        serde_json::from_str(payload).map_err(|err| TransportError::MalformedSample {
            reason: err.to_string(),
        })?;
    wire.into_sample()
}

/// Decodes a history array, dropping malformed entries.
#[must_use]
pub fn decode_samples(values: Vec<serde_json::Value>) -> Vec<Sample> {
    let total = values.len();
    let samples: Vec<Sample> = values
        .into_iter()
        .filter_map(|value| {
            let decoded = serde_json::from_value::<WireSample>(value)
                .map_err(|err| TransportError::MalformedSample {
                    reason: err.to_string(),
                })
                .and_then(WireSample::into_sample);
            match decoded {
                Ok(sample) => Some(sample),
                Err(err) => {
                    debug!("Dropping history entry: {}", err);
                    None
                }
            }
        })
        .collect();
    if samples.len() < total {
        debug!(
            "Dropped {} of {} history entries",
            total.saturating_sub(samples.len()),
            total
        );
    }
    samples
}
