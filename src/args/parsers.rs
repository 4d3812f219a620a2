use std::time::Duration;

use url::Url;

use super::types::PositiveUsize;
use crate::config::parse_duration_value;
use crate::error::{AppError, AppResult, ValidationError};
use crate::pipeline::{CentroidFallback, Window};

/// Reconnect delays never shrink.
const MIN_RECONNECT_GROWTH: f64 = 1.0;

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

pub(crate) fn parse_bool_env(s: &str) -> AppResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(AppError::validation(ValidationError::InvalidBoolean {
            value: s.to_owned(),
        })),
    }
}

pub(crate) fn parse_window(s: &str) -> AppResult<Window> {
    s.parse::<Window>().map_err(AppError::from)
}

pub(crate) fn parse_centroid_fallback(s: &str) -> AppResult<CentroidFallback> {
    s.parse::<CentroidFallback>().map_err(AppError::from)
}

pub(crate) fn parse_server_url(s: &str) -> AppResult<Url> {
    validate_server_url(s).map_err(AppError::from)
}

/// Accepts absolute `http`/`https` URLs only.
pub(crate) fn validate_server_url(s: &str) -> Result<Url, ValidationError> {
    let value = s.trim();
    let url = Url::parse(value).map_err(|err| ValidationError::InvalidServerUrl {
        value: value.to_owned(),
        source: err,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ValidationError::UnsupportedServerScheme {
            value: value.to_owned(),
        }),
    }
}

pub(crate) fn parse_growth(s: &str) -> AppResult<f64> {
    let value = s.trim();
    let growth: f64 = value.parse().map_err(|err| {
        AppError::validation(ValidationError::InvalidFloat {
            value: value.to_owned(),
            source: err,
        })
    })?;
    ensure_growth(growth).map_err(AppError::from)
}

pub(crate) fn ensure_growth(growth: f64) -> Result<f64, ValidationError> {
    if !growth.is_finite() || growth < MIN_RECONNECT_GROWTH {
        return Err(ValidationError::GrowthTooSmall { value: growth });
    }
    Ok(growth)
}

pub(crate) fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    parse_duration_value(s).map_err(AppError::from)
}
