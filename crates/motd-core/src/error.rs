//! Error types for the MOTD operator.

use thiserror::Error;

use crate::status::OperatorHealth;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Supervisor unavailable: {0}")]
    SupervisorUnavailable(String),

    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Status report error: {0}")]
    StatusReport(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Health the operator should report after failing with this error.
    ///
    /// Configuration problems need operator action and map to `Blocked`;
    /// everything else is an `Error`.
    pub fn health(&self) -> OperatorHealth {
        match self {
            Self::InvalidConfig(_) => OperatorHealth::Blocked,
            _ => OperatorHealth::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
