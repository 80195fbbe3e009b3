use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("step {step} is out of range (expected 1..={total})")]
    StepOutOfRange { step: u8, total: u8 },

    #[error("malformed idempotency token '{0}'")]
    MalformedToken(String),

    #[error("project code must not be empty")]
    EmptyProjectCode,

    #[error("project code '{0}' must not contain ':'")]
    ProjectCodeSeparator(String),

    #[error("workspace alias derived from '{0}' is empty")]
    EmptyAlias(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
