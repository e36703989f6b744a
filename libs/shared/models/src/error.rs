use thiserror::Error;

/// Message the backend uses when a request carries no valid session.
pub const NOT_AUTHENTICATED_MESSAGE: &str = "not authenticated";

/// Failure at the RPC boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// Genuine auth failures are never retried: the server explicitly said the
    /// session is gone, or answered with HTTP 401.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            BackendError::NotAuthenticated => true,
            BackendError::Http { status, .. } => *status == 401,
            BackendError::GraphQl(messages) => messages
                .iter()
                .any(|message| message == NOT_AUTHENTICATED_MESSAGE),
            BackendError::Transport(_) | BackendError::Decode(_) => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        !self.is_auth_failure()
    }
}

/// Failure surfaced to callers of the session service.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session service not initialized")]
    NotInitialized,

    #[error("Credential exchange failed: {0}")]
    AuthExchange(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
