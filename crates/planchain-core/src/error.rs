//! Error types for planchain

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("operation already registered: {0}")]
    DuplicateOperation(String),

    #[error("invalid parameter '{param}' for {operation}: {reason}")]
    InvalidParameter {
        operation: String,
        param: String,
        reason: String,
    },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_parameter(
        operation: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            operation: operation.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}
