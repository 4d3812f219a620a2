use std::path::PathBuf;

use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::parsers::{ensure_growth, validate_server_url};
use crate::args::{Command, LinkpulseArgs, PositiveUsize, SourceArgs, WatchArgs};
use crate::error::ConfigError;
use crate::pipeline::{CentroidFallback, Window};

use super::types::{ConfigFile, DurationValue, WatchConfig};

/// Applies configuration values to CLI arguments.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each other.
pub fn apply_config(
    args: &mut LinkpulseArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> Result<(), ConfigError> {
    let sub_matches = matches.subcommand().map_or(matches, |(_, sub)| sub);
    apply_source(args.command.source_mut(), sub_matches, config)?;

    if let Command::Watch(watch) = &mut args.command
        && let Some(watch_config) = config.watch.as_ref()
    {
        apply_watch(watch, sub_matches, watch_config)?;
    }
    Ok(())
}

fn apply_source(
    args: &mut SourceArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> Result<(), ConfigError> {
    if !is_cli(matches, "server")
        && let Some(server) = config.server.as_deref()
    {
        let url = validate_server_url(server).map_err(|err| ConfigError::InvalidField {
            field: "server",
            source: err,
        })?;
        args.server = Some(url);
    }

    if !is_cli(matches, "window")
        && let Some(window) = config.window.as_deref()
    {
        args.window = window
            .parse::<Window>()
            .map_err(|err| ConfigError::InvalidField {
                field: "window",
                source: err,
            })?;
    }

    if !is_cli(matches, "history_limit")
        && let Some(limit) = config.history_limit
    {
        args.history_limit = ensure_positive_usize(limit, "history_limit")?;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.request_timeout.as_ref()
    {
        args.request_timeout = to_duration(timeout, "request_timeout")?;
    }

    Ok(())
}

fn apply_watch(
    args: &mut WatchArgs,
    matches: &ArgMatches,
    config: &WatchConfig,
) -> Result<(), ConfigError> {
    if config.snapshot_db.is_some() && config.no_persist == Some(true) {
        return Err(ConfigError::Conflict {
            left: "watch.snapshot_db",
            right: "watch.no_persist",
        });
    }

    if !is_cli(matches, "decimation_target")
        && let Some(target) = config.decimation_target
    {
        args.decimation_target = ensure_positive_usize(target, "watch.decimation_target")?;
    }

    if !is_cli(matches, "capacity")
        && let Some(capacity) = config.capacity
    {
        args.capacity = ensure_positive_usize(capacity, "watch.capacity")?;
    }

    if !is_cli(matches, "centroid_fallback")
        && let Some(fallback) = config.centroid_fallback.as_deref()
    {
        args.centroid_fallback =
            fallback
                .parse::<CentroidFallback>()
                .map_err(|err| ConfigError::InvalidField {
                    field: "watch.centroid_fallback",
                    source: err,
                })?;
    }

    let persistence_on_cli = is_cli(matches, "snapshot_db") || is_cli(matches, "no_persist");
    if !persistence_on_cli {
        if let Some(path) = config.snapshot_db.as_deref() {
            args.snapshot_db = Some(PathBuf::from(path));
        }
        if let Some(no_persist) = config.no_persist {
            args.no_persist = no_persist;
        }
    }

    let durations = [
        (
            "render_interval",
            "watch.render_interval",
            config.render_interval.as_ref(),
            &mut args.render_interval,
        ),
        (
            "stale_after",
            "watch.stale_after",
            config.stale_after.as_ref(),
            &mut args.stale_after,
        ),
        (
            "stale_poll",
            "watch.stale_poll",
            config.stale_poll.as_ref(),
            &mut args.stale_poll,
        ),
        (
            "seed_grace",
            "watch.seed_grace",
            config.seed_grace.as_ref(),
            &mut args.seed_grace,
        ),
        (
            "refresh_interval",
            "watch.refresh_interval",
            config.refresh_interval.as_ref(),
            &mut args.refresh_interval,
        ),
    ];
    for (arg_id, field, value, target) in durations {
        if !is_cli(matches, arg_id)
            && let Some(value) = value
        {
            *target = to_duration(value, field)?;
        }
    }

    if let Some(reconnect) = config.reconnect.as_ref() {
        if !is_cli(matches, "reconnect_base")
            && let Some(base) = reconnect.base.as_ref()
        {
            args.reconnect_base = to_duration(base, "watch.reconnect.base")?;
        }
        if !is_cli(matches, "reconnect_max")
            && let Some(max) = reconnect.max.as_ref()
        {
            args.reconnect_max = to_duration(max, "watch.reconnect.max")?;
        }
        if !is_cli(matches, "reconnect_growth")
            && let Some(growth) = reconnect.growth
        {
            args.reconnect_growth =
                ensure_growth(growth).map_err(|err| ConfigError::InvalidField {
                    field: "watch.reconnect.growth",
                    source: err,
                })?;
        }
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_usize(value: usize, field: &str) -> Result<PositiveUsize, ConfigError> {
    PositiveUsize::try_from(value).map_err(|err| ConfigError::FieldMustBePositive {
        field: field.to_owned(),
        source: err,
    })
}

fn to_duration(
    value: &DurationValue,
    field: &'static str,
) -> Result<std::time::Duration, ConfigError> {
    value
        .to_duration()
        .map_err(|err| ConfigError::InvalidField { field, source: err })
}
