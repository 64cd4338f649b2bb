use crate::codes::LoginOutcome;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DHStreamError {
    #[error("Login failed! {0}")]
    Login(LoginOutcome),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Already logged in")]
    AlreadyAuthenticated,

    #[error("A stream is already running")]
    AlreadyStreaming,

    #[error("invalid stream type: {0}")]
    InvalidStreamType(i32),

    #[error("realplay failed")]
    StreamStartFailed,

    #[error("Session has been stopped")]
    Stopped,

    #[error("{field} is longer than {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Transport task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DHStreamError>;
