//! Command runners behind the CLI subcommands.
mod oneshot;
mod watch;


use std::sync::Arc;

use url::Url;

use crate::args::SourceArgs;
use crate::error::{AppError, AppResult, ValidationError};
use crate::metrics::Sample;
use crate::stream::{HistoryFetch, HttpHistoryFetch, ServerEndpoints, build_client};

pub(crate) use oneshot::{run_export, run_summary};
pub(crate) use watch::run_watch;

fn require_server(source: &SourceArgs) -> AppResult<&Url> {
    source.server.as_ref().ok_or_else(|| {
        tracing::error!("Missing server URL (set --server or provide in config).");
        AppError::validation(ValidationError::MissingServer)
    })
}

struct Connections {
    client: reqwest::Client,
    endpoints: ServerEndpoints,
}

impl Connections {
    fn new(source: &SourceArgs) -> AppResult<Self> {
        let server = require_server(source)?;
        Ok(Self {
            client: build_client()?,
            endpoints: ServerEndpoints::new(server)?,
        })
    }

    fn history(&self, source: &SourceArgs) -> Arc<HttpHistoryFetch> {
        Arc::new(HttpHistoryFetch::new(
            self.client.clone(),
            self.endpoints.metrics.clone(),
            source.request_timeout,
        ))
    }
}

async fn fetch_once(source: &SourceArgs) -> AppResult<Vec<Sample>> {
    let connections = Connections::new(source)?;
    let history = connections.history(source);
    let samples = history
        .fetch(source.window, source.history_limit.get())
        .await?;
    tracing::debug!(
        "Fetched {} samples from {}",
        samples.len(),
        connections.endpoints.metrics
    );
    Ok(samples)
}
