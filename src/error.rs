use crate::models::FormErrors;
use crate::repositories::RepositoryError;
use crate::services::email_service::EmailError;
use crate::services::user_service::UserServiceError;
use thiserror::Error;

// Type alias for Result with our FlowError
pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Outcome of the signup, verification and cleanup flows.
///
/// Handlers translate every variant into a flash message and a redirect, so
/// nothing past this type reaches the client.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("Too many signup attempts")]
    RateLimited,

    #[error("Invalid verification token")]
    InvalidToken,

    #[error("Verification token has expired")]
    ExpiredToken,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for FlowError {
    fn from(err: RepositoryError) -> Self {
        FlowError::Internal(err.to_string())
    }
}

impl From<EmailError> for FlowError {
    fn from(err: EmailError) -> Self {
        FlowError::Internal(err.to_string())
    }
}

impl From<UserServiceError> for FlowError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Invalid(errors) => FlowError::Validation(errors),
            other => FlowError::Internal(other.to_string()),
        }
    }
}

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
