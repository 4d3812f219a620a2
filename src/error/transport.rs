use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build request URL for '{path}': {source}")]
    BuildUrl {
        path: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to build HTTP client: {source}")]
    BuildClient {
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server returned status {status} for {url}.")]
    Status { url: String, status: u16 },
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Live stream read failed: {source}")]
    StreamRead {
        #[source]
        source: reqwest::Error,
    },
    #[error("Live stream ended.")]
    StreamEnded,
    #[error("Malformed sample: {reason}")]
    MalformedSample { reason: String },
    #[error("{context}: {message}")]
    Unavailable {
        context: &'static str,
        message: String,
    },
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
