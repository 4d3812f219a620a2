use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::TransportError;
use crate::metrics::Sample;
use crate::pipeline::Window;

use super::transport::HistoryFetch;
use super::wire::decode_samples;

pub const DEFAULT_USER_AGENT: &str = concat!("linkpulse/", env!("CARGO_PKG_VERSION"));
/// TCP connect bound shared by live and history requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const METRICS_PATH: &str = "api/metrics";
const STREAM_PATH: &str = "api/stream/samples";

/// Client shared by both transports. No overall request timeout is set
/// here since the live stream stays open indefinitely.
///
/// # Errors
///
/// Returns an error when the TLS backend cannot be initialized.
pub fn build_client() -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(DEFAULT_USER_AGENT)
        .build()
        .map_err(|err| TransportError::BuildClient { source: err })
}

/// Server endpoints resolved against the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoints {
    pub metrics: Url,
    pub stream: Url,
}

impl ServerEndpoints {
    /// Resolves both endpoints below `server`, keeping any base path.
    ///
    /// # Errors
    ///
    /// Returns `BuildUrl` when an endpoint cannot be joined onto `server`.
    pub fn new(server: &Url) -> Result<Self, TransportError> {
        let mut base = server.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        let join = |path: &'static str| {
            base.join(path)
                .map_err(|err| TransportError::BuildUrl { path, source: err })
        };
        Ok(Self {
            metrics: join(METRICS_PATH)?,
            stream: join(STREAM_PATH)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    samples: Vec<serde_json::Value>,
}

/// History pull against `GET {server}/api/metrics?range=&limit=`.
pub struct HttpHistoryFetch {
    client: reqwest::Client,
    metrics_url: Url,
    timeout: Duration,
}

impl HttpHistoryFetch {
    #[must_use]
    pub const fn new(client: reqwest::Client, metrics_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            metrics_url,
            timeout,
        }
    }

    #[must_use]
    pub fn request_url(&self, window: Window, limit: usize) -> Url {
        let mut url = self.metrics_url.clone();
        url.query_pairs_mut()
            .append_pair("range", window.as_str())
            .append_pair("limit", &limit.to_string());
        url
    }
}

#[async_trait]
impl HistoryFetch for HttpHistoryFetch {
    async fn fetch(&self, window: Window, limit: usize) -> Result<Vec<Sample>, TransportError> {
        let url = self.request_url(window, limit);
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| TransportError::Request {
                url: url.to_string(),
                source: err,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body: MetricsResponse =
            response
                .json()
                .await
                .map_err(|err| TransportError::Decode {
                    url: url.to_string(),
                    source: err,
                })?;
        Ok(decode_samples(body.samples))
    }
}
