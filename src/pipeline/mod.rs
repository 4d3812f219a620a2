//! Bounded sample store, decimation, and the command-driven engine that
//! turns them into snapshots.
mod clock;
mod command;
mod decimate;
mod engine;
mod store;
mod window;


pub use clock::{Clock, SystemClock};
pub use command::{Command, Reply, ReplyKind, Snapshot};
pub use decimate::{CentroidFallback, MIN_DECIMATION_TARGET, clamp_target, decimate};
pub use engine::{EngineHandle, PipelineConfig, PipelineEngine, spawn_engine};
pub use store::SampleStore;
pub use window::Window;

use chrono::{DateTime, Utc};

use crate::metrics::Sample;

/// Keeps the samples inside `window` at `now`.
#[must_use]
pub fn filter_window(samples: &[Sample], window: Window, now: DateTime<Utc>) -> Vec<Sample> {
    let cutoff = window.cutoff(now);
    samples
        .iter()
        .filter(|sample| cutoff.is_none_or(|cutoff| sample.timestamp >= cutoff))
        .copied()
        .collect()
}
