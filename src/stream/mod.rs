//! Getting samples in: transports, wire decoding, and the coordinator that
//! keeps the engine fed across disconnects and stale periods.
mod backoff;
pub mod coordinator;
mod http;
mod sse;
mod throttle;
mod transport;
mod wire;


pub use backoff::{Backoff, BackoffPolicy};
pub use coordinator::{
    CoordinatorControl, CoordinatorReport, CoordinatorSettings, StopReason, StreamCoordinator,
};
pub use http::{DEFAULT_USER_AGENT, HttpHistoryFetch, ServerEndpoints, build_client};
pub use sse::{SseDecoder, SseLiveTransport, decode_sse_stream};
pub use throttle::RenderThrottle;
pub use transport::{HistoryFetch, LiveStream, LiveTransport};
pub use wire::{WireFlag, WireSample, decode_samples, parse_sample_json};
