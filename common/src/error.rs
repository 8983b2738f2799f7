use thiserror::Error;

#[derive(Debug, Error)]
pub enum DesignError {
    /// Bad magic, unknown keyword or malformed record.
    #[error("Format error: {0}")]
    Format(String),

    /// Physical data names a logical cell, pin or net that does not exist.
    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("LUT pin conflict on {site}: {message}")]
    PinConflict { site: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DesignError>;
