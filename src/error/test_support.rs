use super::{
    AppError, ConfigError, PersistError, PipelineError, TransportError, ValidationError,
};

macro_rules! test_expectation_from {
    ($target:ident) => {
        impl From<&'static str> for $target {
            fn from(message: &'static str) -> Self {
                $target::TestExpectation { message }
            }
        }

        impl From<String> for $target {
            fn from(value: String) -> Self {
                $target::TestExpectationValue {
                    message: "Test expectation failed",
                    value,
                }
            }
        }
    };
}

test_expectation_from!(ValidationError);
test_expectation_from!(ConfigError);
test_expectation_from!(PipelineError);
test_expectation_from!(TransportError);
test_expectation_from!(PersistError);

impl From<&'static str> for AppError {
    fn from(message: &'static str) -> Self {
        AppError::Pipeline(PipelineError::TestExpectation { message })
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Pipeline(PipelineError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        })
    }
}
