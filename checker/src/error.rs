use contest_common::error::DesignError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Route status tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Route status tool failed: {0}")]
    Tool(String),

    /// Remote oracle selected but not usable as configured.
    #[error("Route status service unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Route status service answered HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed route status report: {0}")]
    Report(String),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OracleError>;
