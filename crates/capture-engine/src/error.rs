use thiserror::Error;

/// Why a request was refused before any process was started.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("resource: {0}")]
    Resource(String),
}

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        RequestError::Validation(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        RequestError::Resource(message.into())
    }
}
