//! Entry points shared by the `fuzz/` targets.
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::LinkpulseArgs;
use crate::config::apply_config;
use crate::config::types::ConfigFile;
use crate::error::{AppError, AppResult, ConfigError};
use crate::metrics::Sample;
use crate::pipeline::{CentroidFallback, decimate};
use crate::stream::SseDecoder;

thread_local! {
    static BASE_MATCHES: ArgMatches =
        LinkpulseArgs::command().get_matches_from(["linkpulse", "watch"]);
}

/// Parses TOML config and merges it onto default `watch` arguments.
///
/// # Errors
///
/// Returns an error when the TOML is invalid or a value fails validation.
pub fn apply_config_from_toml(input: &str) -> AppResult<LinkpulseArgs> {
    let config: ConfigFile = toml::from_str(input).map_err(|source| {
        AppError::config(ConfigError::ParseToml {
            path: PathBuf::from("<fuzz>"),
            source,
        })
    })?;
    BASE_MATCHES.with(|matches| {
        let mut args = LinkpulseArgs::from_arg_matches(matches)?;
        apply_config(&mut args, matches, &config)?;
        Ok(args)
    })
}

/// Feeds `data` to an SSE decoder split at `split`, returning every event
/// payload.
#[must_use]
pub fn decode_sse_split(data: &[u8], split: usize) -> Vec<String> {
    let (head, tail) = data.split_at(split.min(data.len()));
    let mut decoder = SseDecoder::default();
    let mut events = decoder.push(head);
    events.extend(decoder.push(tail));
    events
}

/// Builds a sample series from raw bytes and decimates it.
///
/// Each 3-byte chunk yields one sample: a timestamp step, a success bit, and
/// a latency. Returns the input length alongside the decimated series.
#[must_use]
pub fn decimate_bytes(data: &[u8], fallback: CentroidFallback) -> (usize, usize, Vec<Sample>) {
    let Some((target, rest)) = data.split_first() else {
        return (0, 0, Vec::new());
    };
    let mut samples = Vec::new();
    let mut ts_ms: i64 = 1_700_000_000_000;
    for chunk in rest.chunks_exact(3) {
        let &[step, flags, latency] = chunk else {
            continue;
        };
        ts_ms = ts_ms.saturating_add(i64::from(step));
        let Some(timestamp) = Utc.timestamp_millis_opt(ts_ms).single() else {
            continue;
        };
        let success = flags & 1 == 1;
        let latency_ms = (success && flags & 2 == 2).then_some(f64::from(latency));
        samples.push(Sample::new(timestamp, success, latency_ms));
    }
    let target = usize::from(*target);
    let decimated = decimate(&samples, target, fallback);
    (samples.len(), target, decimated)
}

/// Parses a duration string the way CLI and config values are parsed.
///
/// # Errors
///
/// Returns an error when the value is empty, malformed, or uses an unknown
/// unit.
pub fn parse_duration(input: &str) -> AppResult<std::time::Duration> {
    crate::config::parse_duration_value(input).map_err(AppError::from)
}
