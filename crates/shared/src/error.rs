use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body returned by every failing gateway route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Failure taxonomy for outbound command execution. Validation is checked
/// before the connection state; connection state before any transport call.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),
    #[error("Bot não está pronto ou conectado.")]
    NotConnected,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Transport(String),
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
