use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Sample store capacity must be > 0.")]
    ZeroCapacity,
    #[error("Pipeline engine is no longer running.")]
    EngineClosed,
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
