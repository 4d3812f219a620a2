mod app;
mod config;
mod persist;
mod pipeline;
mod transport;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use persist::PersistError;
pub use pipeline::PipelineError;
pub use transport::TransportError;
pub use validation::ValidationError;
