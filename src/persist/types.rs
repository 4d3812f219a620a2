use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{Sample, SampleRecord};
use crate::pipeline::Window;

/// What gets saved after a render: enough to redraw the chart on the next
/// start before the network catches up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub window: Window,
    pub decimation_target: usize,
    pub samples: Vec<SampleRecord>,
    pub saved_at_ms: i64,
}

impl PersistedSnapshot {
    #[must_use]
    pub fn capture(
        window: Window,
        decimation_target: usize,
        samples: &[Sample],
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            window,
            decimation_target,
            samples: samples.iter().copied().map(SampleRecord::from).collect(),
            saved_at_ms: saved_at.timestamp_millis(),
        }
    }

    /// Samples restored from the projection; records with an unusable
    /// timestamp are skipped.
    #[must_use]
    pub fn samples(&self) -> Vec<Sample> {
        self.samples
            .iter()
            .filter_map(|record| Sample::try_from(*record).ok())
            .collect()
    }
}
