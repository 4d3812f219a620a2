use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::TransportError;
use crate::metrics::Sample;
use crate::pipeline::Window;

/// Push channel of samples. An `Err` item or the end of the stream means the
/// connection is gone.
pub type LiveStream = Pin<Box<dyn Stream<Item = Result<Sample, TransportError>> + Send>>;

#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Opens a new live connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    async fn connect(&self) -> Result<LiveStream, TransportError>;
}

#[async_trait]
pub trait HistoryFetch: Send + Sync {
    /// Pulls recent history for `window`, at most `limit` samples when the
    /// server applies a limit.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the response is unusable.
    async fn fetch(&self, window: Window, limit: usize) -> Result<Vec<Sample>, TransportError>;
}
