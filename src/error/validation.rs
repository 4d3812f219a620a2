use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid number: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid number '{value}': {source}")]
    InvalidFloat {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("Reconnect growth factor must be >= 1.0, got {value}.")]
    GrowthTooSmall { value: f64 },
    #[error("Invalid window '{value}'. Use 5m, 1h, 24h, or all.")]
    InvalidWindow { value: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Invalid server URL '{value}': {source}")]
    InvalidServerUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Server URL '{value}' must use http or https.")]
    UnsupportedServerScheme { value: String },
    #[error("Missing server URL (set --server or provide it in config).")]
    MissingServer,
    #[error("Invalid boolean '{value}'.")]
    InvalidBoolean { value: String },
    #[error("Invalid centroid fallback '{value}'. Use previous-point or next-bucket-time.")]
    InvalidCentroidFallback { value: String },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
