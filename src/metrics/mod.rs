//! Connectivity samples and the statistics computed over them.
mod aggregate;
mod types;


pub use aggregate::aggregate;
pub use types::{MetricsSummary, Sample, SampleRecord};
