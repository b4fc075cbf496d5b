use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unsupported payload format: {0}")]
    UnsupportedFormat(String),

    #[error("payload does not decode as {format}: {reason}")]
    InvalidPayload {
        format: &'static str,
        reason: String,
    },

    #[error("unknown execution mode: {0}")]
    UnknownMode(String),

    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
