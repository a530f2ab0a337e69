use shared::{ErrorKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server understood the request and refused it
    #[error("{message}")]
    Api { kind: ErrorKind, message: String },

    #[error("no active session uses code {0}")]
    InvalidCode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connect failure, timeout, 5xx or an undecodable body; safe to retry
    #[error("server unreachable: {0}")]
    Transient(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api { kind, .. } => Some(*kind),
            ClientError::InvalidCode(_) => Some(ErrorKind::NotFound),
            ClientError::Validation(_) => Some(ErrorKind::Validation),
            ClientError::Transient(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transient(e.to_string())
    }
}
