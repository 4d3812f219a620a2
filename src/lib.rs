//! Core library for the `linkpulse` CLI.
//!
//! `linkpulse` follows a connectivity-monitoring server: it seeds a bounded
//! sample store from the history API, appends live samples from an SSE feed,
//! and renders windowed metrics over a shape-preserving decimated series. The
//! stream coordinator handles reconnect backoff, staleness fallback, and
//! local snapshot persistence. The primary interface is the `linkpulse`
//! command-line application.
mod app;
pub mod args;
pub mod config;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod render;
mod shutdown;
pub mod stream;
pub mod system;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
