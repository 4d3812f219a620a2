use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Trailing time span over which samples are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Window {
    #[default]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "all")]
    All,
}

impl Window {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Window::FiveMinutes => "5m",
            Window::OneHour => "1h",
            Window::TwentyFourHours => "24h",
            Window::All => "all",
        }
    }

    /// Span of the window, `None` for [`Window::All`] which never evicts.
    #[must_use]
    pub fn duration(self) -> Option<TimeDelta> {
        match self {
            Window::FiveMinutes => Some(TimeDelta::seconds(5 * 60)),
            Window::OneHour => Some(TimeDelta::seconds(60 * 60)),
            Window::TwentyFourHours => Some(TimeDelta::seconds(24 * 60 * 60)),
            Window::All => None,
        }
    }

    /// Oldest timestamp still inside the window at `now`.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration()
            .and_then(|span| now.checked_sub_signed(span))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Window {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5m" => Ok(Window::FiveMinutes),
            "1h" => Ok(Window::OneHour),
            "24h" => Ok(Window::TwentyFourHours),
            "all" => Ok(Window::All),
            _ => Err(ValidationError::InvalidWindow {
                value: s.to_owned(),
            }),
        }
    }
}
