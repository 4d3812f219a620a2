use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One connectivity check result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampleRecord", into = "SampleRecord")]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: Option<f64>,
}

impl Sample {
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, success: bool, latency_ms: Option<f64>) -> Self {
        Self {
            timestamp,
            success,
            latency_ms,
        }
    }

    /// Timestamp as unix milliseconds, the X axis used by decimation.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Compact projection of a [`Sample`] used on the engine wire and in
/// persisted snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub t: i64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,
}

impl From<Sample> for SampleRecord {
    fn from(sample: Sample) -> Self {
        Self {
            t: sample.timestamp_ms(),
            ok: sample.success,
            l: sample.latency_ms,
        }
    }
}

impl TryFrom<SampleRecord> for Sample {
    type Error = String;

    fn try_from(record: SampleRecord) -> Result<Self, Self::Error> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(record.t)
            .ok_or_else(|| format!("Timestamp {} ms is out of range", record.t))?;
        Ok(Sample::new(timestamp, record.ok, record.l))
    }
}

/// Summary statistics over a window of samples.
///
/// Latency fields are `None` when no successful sample carried a latency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub packet_loss_pct: f64,
    pub avg_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
}
