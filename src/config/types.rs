use std::time::Duration;

use serde::Deserialize;

use crate::error::ValidationError;

/// Optional settings file; every field mirrors a CLI flag and only fills in
/// what was not given on the command line.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub server: Option<String>,
    pub window: Option<String>,
    pub history_limit: Option<usize>,
    pub request_timeout: Option<DurationValue>,
    pub watch: Option<WatchConfig>,
}

/// Settings that only apply to `watch`.
#[derive(Debug, Default, Deserialize)]
pub struct WatchConfig {
    pub decimation_target: Option<usize>,
    pub capacity: Option<usize>,
    pub centroid_fallback: Option<String>,
    pub snapshot_db: Option<String>,
    pub no_persist: Option<bool>,
    pub render_interval: Option<DurationValue>,
    pub stale_after: Option<DurationValue>,
    pub stale_poll: Option<DurationValue>,
    pub seed_grace: Option<DurationValue>,
    pub refresh_interval: Option<DurationValue>,
    pub reconnect: Option<ReconnectConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconnectConfig {
    pub base: Option<DurationValue>,
    pub max: Option<DurationValue>,
    pub growth: Option<f64>,
}

/// Either whole seconds or a string with a unit suffix.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }
}
