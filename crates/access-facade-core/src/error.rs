//! Shared error type across access-facade crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// No usable subject on the request.
    AuthFailed,
    /// Refused by policy.
    NotAllowed,
    /// A collaborator (identity service, sink) could not be reached.
    Unavailable,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::NotAllowed => "NOT_ALLOWED",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AccessFacadeError>;

/// Unified error type used by the facades and the demo service.
#[derive(Debug, Error)]
pub enum AccessFacadeError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("auth failed")]
    AuthFailed,
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("audit queue full")]
    QueueFull,
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AccessFacadeError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            AccessFacadeError::BadRequest(_) => ClientCode::BadRequest,
            AccessFacadeError::AuthFailed => ClientCode::AuthFailed,
            AccessFacadeError::NotAllowed(_) => ClientCode::NotAllowed,
            AccessFacadeError::Unavailable(_) | AccessFacadeError::QueueFull => {
                ClientCode::Unavailable
            }
            AccessFacadeError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            AccessFacadeError::Io(_) | AccessFacadeError::Internal(_) => ClientCode::Internal,
        }
    }
}
